use crate::error::{Result, SelkitError};
use crate::types::Scaffold;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

/// Project-relative location of generated spiders.
const SPIDERS_DIR: &str = "src/project/spiders";
const ITEMS_FILE: &str = "src/project/items.py";

/// Renders the Scrapy spider and item modules for `name`, crawling from `url`
/// and extracting `selector`.
pub fn scaffold(name: &str, url: &str, selector: &str) -> Result<Scaffold> {
    let allowed_domain = allowed_domain(url)?;
    let base = capitalize(name);
    let spider_class = format!("{}Spider", base);
    let item_class = format!("{}Item", base);

    let spider_code = format!(
        r#"
import scrapy
from project.items import {item_class}

class {spider_class}(scrapy.Spider):
    name = "{name}"
    allowed_domains = ["{allowed_domain}"]
    start_urls = ["{url}"]

    def parse(self, response):
        for item in response.css("{selector}"):
            yield {item_class}()
"#
    );

    let item_code = format!(
        r#"
import scrapy

class {item_class}(scrapy.Item):
    # define the fields for your item here like:
    # name = scrapy.Field()
    pass
"#
    );

    Ok(Scaffold {
        spider_code,
        item_code,
    })
}

/// Writes the spider module and appends the item class; returns both paths.
pub fn write_scaffold(
    project_dir: &Path,
    name: &str,
    scaffold: &Scaffold,
) -> Result<(PathBuf, PathBuf)> {
    if !is_valid_spider_name(name) {
        return Err(SelkitError::InvalidSpiderName);
    }

    let spider_path = spider_path(project_dir, name);
    if let Some(dir) = spider_path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&spider_path, &scaffold.spider_code)?;
    info!("Created spider: {}", spider_path.display());

    let items_path = project_dir.join(ITEMS_FILE);
    let mut items = OpenOptions::new().create(true).append(true).open(&items_path)?;
    write!(items, "\n\n{}", scaffold.item_code)?;
    info!("Updated items: {}", items_path.display());

    Ok((spider_path, items_path))
}

/// Location of a spider module inside the crawler project.
pub fn spider_path(project_dir: &Path, name: &str) -> PathBuf {
    project_dir.join(SPIDERS_DIR).join(format!("{}.py", name))
}

pub fn is_valid_spider_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(char::is_alphanumeric)
}

fn allowed_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| SelkitError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| SelkitError::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        })
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
