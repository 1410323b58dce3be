//! Command-line front end for selkit.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use selkit::{
    build_http_client, crawl, discover, explain, repair, scaffold, selectors, Config, PageFetcher,
};

#[derive(Parser)]
#[command(name = "selkit")]
#[command(about = "Test URLs, explain and repair CSS selectors, scaffold and run spiders")]
#[command(version)]
struct Cli {
    /// Scrapy project root used by `spider scaffold` and `crawl run`
    #[arg(long, global = true, env = "SELKIT_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// URL checks
    #[command(subcommand)]
    Url(UrlCommand),

    /// Selector testing, explanation, repair and discovery
    #[command(subcommand)]
    Selector(SelectorCommand),

    /// Spider scaffolding
    #[command(subcommand)]
    Spider(SpiderCommand),

    /// Crawl execution
    #[command(subcommand)]
    Crawl(CrawlCommand),
}

#[derive(Subcommand)]
enum UrlCommand {
    /// Test a single URL
    Test {
        url: String,

        /// Render javascript on the page
        #[arg(long)]
        render: bool,
    },
}

#[derive(Subcommand)]
enum SelectorCommand {
    /// Test a CSS selector on a URL
    Test {
        url: String,
        selector: String,

        /// Render javascript on the page
        #[arg(long)]
        render: bool,
    },

    /// Explain a CSS selector
    Explain { selector: String },

    /// Repair a broken CSS selector
    Repair { url: String, selector: String },

    /// Propose selectors that match exactly one element
    Discover { url: String },
}

#[derive(Subcommand)]
enum SpiderCommand {
    /// Scaffold a new spider
    Scaffold {
        name: String,
        url: String,
        selector: String,

        /// Print the generated code instead of writing files
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum CrawlCommand {
    /// Run a spider
    Run {
        spider: String,

        /// Spider argument, passed as `-a <ARG>`
        #[arg(long = "arg")]
        args: Vec<String>,

        /// Output file, passed as `-O <OUT>`
        #[arg(long)]
        out: Option<String>,

        /// Crawler executable
        #[arg(long, env = "SELKIT_CRAWL_BIN")]
        crawl_bin: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let project_dir = cli.project_dir;

    match cli.command {
        Commands::Selector(SelectorCommand::Explain { selector }) => explain_selector(&selector),
        Commands::Url(UrlCommand::Test { url, render }) => {
            let fetcher = fetcher(&load_config(project_dir)?)?;
            url_test(&fetcher, &url, render).await
        }
        Commands::Selector(cmd) => {
            let fetcher = fetcher(&load_config(project_dir)?)?;
            selector_command(&fetcher, cmd).await
        }
        Commands::Spider(SpiderCommand::Scaffold {
            name,
            url,
            selector,
            dry_run,
        }) => {
            let config = load_config(project_dir)?;
            spider_scaffold(&config, &name, &url, &selector, dry_run)
        }
        Commands::Crawl(CrawlCommand::Run {
            spider,
            args,
            out,
            crawl_bin,
        }) => {
            let mut config = load_config(project_dir)?;
            if let Some(bin) = crawl_bin {
                config.crawl_bin = bin;
            }
            crawl_run(&config, &spider, &args, out.as_deref()).await
        }
    }
}

/// The CLI never listens, so listener settings are left out of the load.
fn load_config(project_dir: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::from_env_without_listener()?;
    if let Some(dir) = project_dir {
        config.project_dir = dir;
    }
    Ok(config)
}

fn fetcher(config: &Config) -> Result<PageFetcher> {
    Ok(PageFetcher::new(build_http_client(config)?))
}

fn explain_selector(selector: &str) -> Result<ExitCode> {
    println!("Explaining selector: {}", selector);
    println!("{}", explain::explain(selector)?);
    Ok(ExitCode::SUCCESS)
}

async fn url_test(fetcher: &PageFetcher, url: &str, render: bool) -> Result<ExitCode> {
    println!("Testing {}", url);
    let page = fetcher.fetch(url, render).await?;
    println!("Status: {}", page.status);
    println!("Latency: {:.2} seconds", page.latency);
    println!("Charset: {}", page.charset.as_deref().unwrap_or("unknown"));
    Ok(ExitCode::SUCCESS)
}

async fn selector_command(fetcher: &PageFetcher, cmd: SelectorCommand) -> Result<ExitCode> {
    match cmd {
        SelectorCommand::Test {
            url,
            selector,
            render,
        } => {
            println!("Testing selector '{}' on {}", selector, url);
            if render {
                println!("JS rendering enabled");
            }
            let report = selectors::test_selector_at(fetcher, &url, &selector, render).await?;
            println!("Match count: {}", report.match_count);
            if let Some(first) = &report.first_match {
                println!("First {} text samples:", report.samples.len());
                for sample in &report.samples {
                    println!("- {}", sample);
                }
                println!("First match outer HTML:");
                println!("{}", first);
            }
        }
        SelectorCommand::Explain { selector } => return explain_selector(&selector),
        SelectorCommand::Repair { url, selector } => {
            println!("{}", repair::repair(fetcher, &url, &selector).await);
        }
        SelectorCommand::Discover { url } => {
            let found = discover::discover(fetcher, &url).await?;
            if found.is_empty() {
                println!("No unique selectors found.");
            }
            for item in found {
                println!("{}\t{}", item.selector, item.sample_text.replace('\n', " "));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn spider_scaffold(
    config: &Config,
    name: &str,
    url: &str,
    selector: &str,
    dry_run: bool,
) -> Result<ExitCode> {
    println!("Scaffolding spider: {}", name);
    let generated = scaffold::scaffold(name, url, selector)?;

    if dry_run {
        println!("{}", generated.spider_code);
        println!("{}", generated.item_code);
        return Ok(ExitCode::SUCCESS);
    }

    let (spider_path, items_path) =
        scaffold::write_scaffold(&config.project_dir, name, &generated)?;
    println!("Created spider: {}", spider_path.display());
    println!("Updated items: {}", items_path.display());
    Ok(ExitCode::SUCCESS)
}

async fn crawl_run(
    config: &Config,
    spider: &str,
    args: &[String],
    out: Option<&str>,
) -> Result<ExitCode> {
    println!("Running spider: {}", spider);
    println!(
        "Executing command: {} {}",
        config.crawl_bin,
        crawl::crawl_args(spider, args, out).join(" ")
    );

    let output = crawl::run_crawl(config, spider, args, out).await?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);

    match output.status {
        Some(0) => Ok(ExitCode::SUCCESS),
        Some(code) => Err(anyhow!("crawler exited with status {}", code)),
        None => Err(anyhow!("crawler was terminated by a signal")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explain_ignores_environment() {
        std::env::set_var("SELKIT_PORT", "not-a-port");
        let cli = Cli::try_parse_from(["selkit", "selector", "explain", "#main"]).unwrap();
        assert_eq!(run(cli).await.unwrap(), ExitCode::SUCCESS);

        let cli = Cli::try_parse_from(["selkit", "selector", "explain", "a[href]"]).unwrap();
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("Malformed selector"));
    }

    #[test]
    fn test_nested_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "selkit", "crawl", "run", "books", "--arg", "a=1", "--arg", "b=2", "--out", "o.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Crawl(CrawlCommand::Run { spider, args, out, .. }) => {
                assert_eq!(spider, "books");
                assert_eq!(args, vec!["a=1", "b=2"]);
                assert_eq!(out.as_deref(), Some("o.json"));
            }
            _ => panic!("expected crawl run"),
        }
    }
}
