use anyhow::Context;
use clap::{Parser, Subcommand};
use fetchlinks::config::DEFAULT_MAX_REDIRECTS;
use fetchlinks::logging::init_logging;
use fetchlinks::{set_base_uri, user_agent, Extension, FetchLinks, FetchOptions, Fetcher, PostInfo};
use std::io::{self, Read, Write};
use std::time::Duration;

/// fetchlinks - splice the page a feed post links to into the post
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Timeout in milliseconds for network requests (transport default when omitted)
    #[arg(short = 't', long = "timeout-ms", global = true)]
    timeout_ms: Option<u64>,

    /// Maximum number of redirects to follow
    #[arg(long = "max-redirects", global = true, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Log everything at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a link and print its HTML, rebased on the page's own URL
    Fetch {
        /// Link to retrieve
        link: String,

        /// Feed the link was found in (sent as the referer)
        #[arg(long, default_value = "")]
        feed: String,
    },
    /// Read a post body from stdin and replace its placeholder with the linked page
    Post {
        /// The post's link
        #[arg(long)]
        link: Option<String>,

        /// Feed the post came from
        #[arg(long, default_value = "")]
        feed: String,
    },
    /// Read HTML from stdin and point its base href at BASE_URI
    Rebase { base_uri: String },
    /// Print the user agent sent with HTTP requests
    UserAgent,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let options = FetchOptions {
        timeout: args.timeout_ms.map(Duration::from_millis),
        max_redirects: args.max_redirects,
        ..FetchOptions::default()
    }
    .with_env_overrides();

    match &args.command {
        Command::Fetch { link, feed } => {
            let fetcher = Fetcher::new(&options).context("failed to build http client")?;
            let result = fetcher
                .fetch(feed, link)
                .with_context(|| format!("failed to fetch {link}"))?;
            tracing::info!(url = %result.final_url, "fetched");
            write_stdout(&result.content)
        }
        Command::Post { link, feed } => {
            let extension = FetchLinks::new(&options).context("failed to build http client")?;
            let mut post = PostInfo {
                from_addr: feed.clone(),
                post_link: link.clone(),
                description: read_stdin()?,
            };

            extension.begin_retrieve();
            let create_post = extension.pre_process_item(&mut post);
            if create_post {
                extension.post_process_item(&post);
            }
            extension.end_retrieve();

            write_stdout(&post.description)
        }
        Command::Rebase { base_uri } => write_stdout(&set_base_uri(&read_stdin()?, base_uri)),
        Command::UserAgent => write_stdout(user_agent()),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    Ok(input)
}

fn write_stdout(text: &str) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
