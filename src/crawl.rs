use crate::config::Config;
use crate::error::{Result, SelkitError};
use crate::scaffold::{is_valid_spider_name, spider_path};
use crate::types::CrawlOutput;
use tokio::process::Command;
use tracing::info;

/// Arguments passed to the crawler after the program name.
pub fn crawl_args(spider: &str, args: &[String], out: Option<&str>) -> Vec<String> {
    let mut command = vec!["crawl".to_string(), spider.to_string()];
    for arg in args {
        command.push("-a".to_string());
        command.push(arg.clone());
    }
    if let Some(out) = out {
        command.push("-O".to_string());
        command.push(out.to_string());
    }
    command
}

/// Runs a generated spider through the external crawler and returns its raw output.
pub async fn run_crawl(
    config: &Config,
    spider: &str,
    args: &[String],
    out: Option<&str>,
) -> Result<CrawlOutput> {
    if !is_valid_spider_name(spider) {
        return Err(SelkitError::InvalidSpiderName);
    }
    if !spider_path(&config.project_dir, spider).is_file() {
        return Err(SelkitError::SpiderNotFound(spider.to_string()));
    }

    let command = crawl_args(spider, args, out);
    info!("Executing command: {} {}", config.crawl_bin, command.join(" "));

    let output = Command::new(&config.crawl_bin)
        .args(&command)
        .current_dir(&config.project_dir)
        .output()
        .await
        .map_err(|e| SelkitError::CrawlLaunch {
            program: config.crawl_bin.clone(),
            reason: e.to_string(),
        })?;

    info!("Crawler exited with {}", output.status);
    Ok(CrawlOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn project_with_spider(dir: &Path, name: &str) {
        let spiders = dir.join("src/project/spiders");
        fs::create_dir_all(&spiders).unwrap();
        fs::write(spiders.join(format!("{}.py", name)), "# spider").unwrap();
    }

    fn config(dir: &Path, crawl_bin: &str) -> Config {
        Config {
            project_dir: dir.to_path_buf(),
            crawl_bin: crawl_bin.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_crawl_args() {
        let args = vec!["category=books".to_string(), "limit=5".to_string()];
        assert_eq!(
            crawl_args("books", &args, Some("out.json")),
            vec!["crawl", "books", "-a", "category=books", "-a", "limit=5", "-O", "out.json"]
        );
        assert_eq!(crawl_args("books", &[], None), vec!["crawl", "books"]);
    }

    #[tokio::test]
    async fn test_invalid_spider_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_crawl(&config(dir.path(), "echo"), "bad;name", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid spider name");
    }

    #[tokio::test]
    async fn test_missing_spider() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_crawl(&config(dir.path(), "echo"), "ghost", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Spider not found: ghost");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        project_with_spider(dir.path(), "books");

        let output = run_crawl(
            &config(dir.path(), "echo"),
            "books",
            &["page=2".to_string()],
            Some("items.jl"),
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, "crawl books -a page=2 -O items.jl\n");
        assert_eq!(output.stderr, "");
        assert_eq!(output.status, Some(0));
    }

    #[tokio::test]
    async fn test_missing_crawler_binary() {
        let dir = tempfile::tempdir().unwrap();
        project_with_spider(dir.path(), "books");

        let err = run_crawl(&config(dir.path(), "selkit-no-such-crawler"), "books", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SelkitError::CrawlLaunch { .. }));
    }
}
