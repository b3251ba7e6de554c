// bard-client - ask Bard from the terminal

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bard_client::{
    Answer, BardClient, ClientConfig, GoogleTranslator, HttpTransport, TranslationBridge, Transport,
};
use bard_config::TranslatorConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask questions to Bard through its web session", long_about = None)]
struct Args {
    /// YAML config file (service endpoints, proxy, timeouts, translator)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Value of the __Secure-1PSID cookie
    #[arg(long, env = "BARD_TOKEN", hide_env_values = true)]
    token: String,

    /// Translate unsupported languages through this pivot (e.g. en)
    #[arg(long)]
    pivot: Option<String>,

    /// Render image markers as markdown
    #[arg(long)]
    markdown: bool,

    /// Print the whole answer as JSON
    #[arg(long, conflicts_with = "markdown")]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Question to ask; omit for an interactive session
    question: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(pivot) = &args.pivot {
        config
            .translator
            .get_or_insert_with(TranslatorConfig::default)
            .pivot_language = pivot.clone();
    }

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&config.http).context("building HTTP transport")?);
    let translator_config = config.translator.clone();
    let mut client = BardClient::new(args.token.clone(), config, transport.clone())
        .context("creating client")?;
    if let Some(tc) = translator_config {
        let translator = GoogleTranslator::from_config(transport, &tc);
        client = client.with_translator(TranslationBridge::new(
            Box::new(translator),
            tc.pivot_language,
        ));
    }

    if !args.question.is_empty() {
        let answer = client.ask(&args.question.join(" "))?;
        print_answer(&answer, &args)?;
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                client.reset();
                println!("(new conversation)");
            }
            question => match client.ask(question) {
                Ok(answer) => print_answer(&answer, &args)?,
                Err(e) => eprintln!("error: {e}"),
            },
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_answer(answer: &Answer, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(answer)?);
    } else if args.markdown {
        println!("{}", answer.markdown());
    } else {
        println!("{}", answer.text);
    }
    Ok(())
}
