#![deny(warnings)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use lingvanex_core::config::{
    resolve_api_key, resolve_string_with_default, ClientBuilder, Env, StdEnv, DEFAULT_BASE_URL,
    DEFAULT_RETRY_MAX, ENV_LINGVANEX_API_KEY, ENV_LINGVANEX_API_URL,
};
use lingvanex_core::model::TranslateMode;
use lingvanex_core::LingvanexClient;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lingvanex")]
#[command(about = "Command-line client for the Lingvanex translation API")]
struct Args {
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_RETRY_MAX)]
    retry_max: u32,

    #[arg(long, global = true, default_value_t = 15)]
    conn_timeout_secs: u64,

    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    #[arg(long, global = true, default_value_t = false)]
    transliteration: bool,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List languages supported by the service
    Languages {
        #[arg(long, default_value = "")]
        code: String,

        #[arg(long)]
        json: bool,
    },
    /// Translate a piece of text
    Translate {
        #[arg(long, default_value = "")]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        html: bool,

        #[arg(long)]
        json: bool,

        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let builder = build_config(&args, &env)?;
    tracing::info!(
        base_url = %builder.config().base_url,
        retry_max = builder.config().retry_max,
        "config loaded"
    );
    let client = builder.build().context("failed to build http client")?;

    run(client, args.command).await
}

async fn run(client: LingvanexClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Languages { code, json } => {
            let languages = client
                .get_languages(&code)
                .await
                .context("failed to list languages")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&languages)?);
            } else {
                for lang in languages {
                    println!("{}\t{}", lang.full_code, lang.english_name);
                }
            }
        }
        Command::Translate {
            from,
            to,
            html,
            json,
            text,
        } => {
            let mut params = client.translation_request(&text, &from, &to);
            if html {
                params = params.with_mode(TranslateMode::Html);
            }
            let result = client
                .translate_request(&params)
                .await
                .context("translation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.translated_text);
                if let Some(src) = result.source_transliteration {
                    println!("source transliteration: {src}");
                }
                if let Some(dst) = result.target_transliteration {
                    println!("target transliteration: {dst}");
                }
            }
        }
    }
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<ClientBuilder> {
    let api_key = resolve_api_key(args.api_key.clone(), ENV_LINGVANEX_API_KEY, env)?;
    let base_url = resolve_string_with_default(
        args.base_url.clone(),
        ENV_LINGVANEX_API_URL,
        env,
        DEFAULT_BASE_URL,
    );

    let mut builder = ClientBuilder::new()
        .base_url(base_url)
        .api_key(api_key)
        .retry_max(args.retry_max)
        .conn_timeout(Duration::from_secs(args.conn_timeout_secs))
        .transliteration(args.transliteration);
    if let Some(secs) = args.deadline_secs {
        builder = builder.deadline(Duration::from_secs(secs));
    }
    Ok(builder)
}
