//! Sitemap generation for the public site.
//!
//! Collects every crawlable URL from the backend, splits the URLs into per-group
//! files of at most `max_urls_per_file` entries, and writes a `sitemap.xml` index
//! next to them. Full item lists are cached on disk between runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::backend::{BackendError, ListingBackend, sitemap_records};
use crate::domain::entities::{FacetOption, Hackathon, Job, Listed, Resource};
use crate::domain::slug::{detail_path, facet_name_slug, seo_title};
use crate::domain::types::{FacetSource, ListingKind};

const SOURCE: &str = "application::sitemap";

pub const INDEX_FILE: &str = "sitemap.xml";
const URLSET_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";

const STATIC_PAGES: &[&str] = &[
    "/",
    "/hackathons",
    "/about",
    "/contact",
    "/terms-of-use",
    "/privacy-policy",
    "/jobs",
    "/resources",
];
const HACKATHON_SECTIONS: &[&str] = &["#overview", "#schedule", "#judges", "#prizes"];

#[derive(Debug, Clone)]
pub struct SitemapOptions {
    /// Origin prepended to every path, e.g. `https://devhub.xyz`.
    pub public_base_url: String,
    pub output_dir: PathBuf,
    /// How long a cached item list stays fresh.
    pub cache_ttl: Duration,
    pub max_urls_per_file: usize,
}

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("sitemap i/o failed for `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SitemapError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapImage {
    pub loc: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// Site-relative path, possibly with a query or fragment.
    pub path: String,
    /// `YYYY-MM-DD`.
    pub lastmod: String,
    pub priority: &'static str,
    pub image: Option<SitemapImage>,
}

impl SitemapEntry {
    fn new(path: String, lastmod: String, priority: &'static str) -> Self {
        Self {
            path,
            lastmod,
            priority,
            image: None,
        }
    }
}

/// URLs written to the files `sitemap-<name>-<n>.xml`.
#[derive(Debug, Clone)]
pub struct UrlGroup {
    pub name: String,
    pub entries: Vec<SitemapEntry>,
}

impl UrlGroup {
    fn new(name: &str, entries: Vec<SitemapEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }
}

/// Outcome of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct SitemapReport {
    pub files: Vec<String>,
    pub urls: usize,
    /// True when collecting failed and only static pages were written.
    pub degraded: bool,
}

/// Service generating and serving sitemap files.
pub struct SitemapService {
    backend: Arc<dyn ListingBackend>,
    options: SitemapOptions,
    running: Mutex<()>,
}

impl SitemapService {
    pub fn new(backend: Arc<dyn ListingBackend>, options: SitemapOptions) -> Self {
        Self {
            backend,
            options,
            running: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &SitemapOptions {
        &self.options
    }

    pub async fn generate(&self) -> Result<SitemapReport, SitemapError> {
        self.generate_at(OffsetDateTime::now_utc()).await
    }

    /// Regenerate every sitemap file as of `now`. Runs are serialized.
    pub async fn generate_at(&self, now: OffsetDateTime) -> Result<SitemapReport, SitemapError> {
        let _running = self.running.lock().await;
        let dir = &self.options.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| SitemapError::io(dir, err))?;

        let today = format_date(now.date());
        let (groups, degraded) = match self.collect(&today).await {
            Ok(groups) => (groups, false),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    error = %err,
                    "failed to collect sitemap urls; writing static pages only"
                );
                (vec![static_group(&today)], true)
            }
        };

        let max = self.options.max_urls_per_file.max(1);
        let mut files = Vec::new();
        let mut urls = 0;
        for group in &groups {
            for (index, chunk) in group.entries.chunks(max).enumerate() {
                let filename = format!("sitemap-{}-{}.xml", group.name, index + 1);
                let body = render_urlset(&self.options.public_base_url, chunk);
                self.write(&filename, body).await?;
                debug!(target = SOURCE, file = %filename, urls = chunk.len(), "sitemap file written");
                urls += chunk.len();
                files.push(filename);
            }
        }

        self.remove_stale(&files).await;
        let index = render_index(&self.options.public_base_url, &files);
        self.write(INDEX_FILE, index).await?;
        metrics::counter!("devhub_sitemap_urls_total").increment(urls as u64);
        info!(
            target = SOURCE,
            files = files.len(),
            urls,
            degraded,
            "sitemaps generated"
        );

        Ok(SitemapReport {
            files,
            urls,
            degraded,
        })
    }

    /// Delete chunk files left over from an earlier run that produced more of them.
    async fn remove_stale(&self, written: &[String]) {
        let dir = &self.options.output_dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(target = SOURCE, dir = %dir.display(), error = %err, "failed to list sitemap directory");
                return;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(target = SOURCE, dir = %dir.display(), error = %err, "failed to list sitemap directory");
                    break;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_chunk_file(name) || written.iter().any(|file| file == name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => debug!(target = SOURCE, file = name, "stale sitemap file removed"),
                Err(err) => warn!(
                    target = SOURCE,
                    file = name,
                    error = %err,
                    "failed to remove stale sitemap file"
                ),
            }
        }
    }

    /// Read a generated file. Only `sitemap*.xml` names inside the output
    /// directory are served.
    pub async fn read_file(&self, name: &str) -> Result<Option<String>, SitemapError> {
        if !is_sitemap_file(name) {
            return Ok(None);
        }
        let path = self.options.output_dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SitemapError::io(&path, err)),
        }
    }

    pub fn robots_txt(&self) -> String {
        let base = self.options.public_base_url.trim_end_matches('/');
        format!("User-agent: *\nAllow: /\nSitemap: {base}/{INDEX_FILE}\n")
    }

    /// Every URL group in file order.
    pub async fn collect(&self, today: &str) -> Result<Vec<UrlGroup>, SitemapError> {
        let (hackathons, jobs, resources, active) = tokio::try_join!(
            self.cached_records::<Hackathon>(),
            self.cached_records::<Job>(),
            self.cached_records::<Resource>(),
            async {
                self.backend
                    .active_hackathons()
                    .await
                    .map_err(SitemapError::from)
            },
        )?;
        let (hackathon_facets, job_facets, resource_facets) = tokio::try_join!(
            self.facet_groups(ListingKind::Hackathons, today),
            self.facet_groups(ListingKind::Jobs, today),
            self.facet_groups(ListingKind::Resources, today),
        )?;

        let mut seen = HashSet::new();
        let mut groups = vec![static_group(today)];

        groups.push(UrlGroup::new(
            "hackathons",
            item_entries(&hackathons, today, &mut seen),
        ));
        groups.push(UrlGroup::new(
            "hackathon-sections",
            section_entries(&hackathons, today),
        ));
        groups.extend(hackathon_facets);
        let active_entries = active
            .iter()
            .map(|hackathon| {
                let mut entry = item_entry(hackathon, today);
                entry.priority = "1.0";
                entry
            })
            .collect();
        groups.push(UrlGroup::new("active-hackathons", active_entries));
        groups.push(sort_group(ListingKind::Hackathons, today));

        groups.push(UrlGroup::new("jobs", item_entries(&jobs, today, &mut seen)));
        groups.extend(job_facets);
        groups.push(sort_group(ListingKind::Jobs, today));

        groups.push(UrlGroup::new(
            "resources",
            item_entries(&resources, today, &mut seen),
        ));
        groups.extend(resource_facets);
        groups.push(sort_group(ListingKind::Resources, today));

        Ok(groups)
    }

    async fn facet_groups(
        &self,
        kind: ListingKind,
        today: &str,
    ) -> Result<Vec<UrlGroup>, SitemapError> {
        let sources = kind.facet_sources();
        let options = try_join_all(sources.iter().map(|source| self.backend.facets(source))).await?;
        Ok(sources
            .iter()
            .zip(options)
            .map(|(source, options)| {
                let entries = options
                    .iter()
                    .flat_map(|option| facet_entries(kind, source, option, today))
                    .collect();
                UrlGroup::new(source.sitemap_group, entries)
            })
            .collect())
    }

    /// Full item list of `T`'s listing, served from the on-disk cache while fresh.
    async fn cached_records<T>(&self) -> Result<Vec<T>, SitemapError>
    where
        T: Listed + Serialize + DeserializeOwned + Send,
    {
        let kind = T::KIND;
        let path = self
            .options
            .output_dir
            .join(format!("{kind}-sitemap-cache.json"));

        if self.cache_is_fresh(&path).await {
            match read_cache::<T>(&path).await {
                Ok(records) => {
                    debug!(target = SOURCE, listing = %kind, records = records.len(), "using cached sitemap records");
                    return Ok(records);
                }
                Err(err) => warn!(
                    target = SOURCE,
                    listing = %kind,
                    error = %err,
                    "ignoring unreadable sitemap cache"
                ),
            }
        }

        let records: Vec<T> = sitemap_records(self.backend.as_ref(), kind).await?;
        match serde_json::to_vec(&records) {
            Ok(bytes) => {
                if let Err(err) = tokio::fs::write(&path, bytes).await {
                    warn!(target = SOURCE, listing = %kind, error = %err, "failed to write sitemap cache");
                }
            }
            Err(err) => {
                warn!(target = SOURCE, listing = %kind, error = %err, "failed to encode sitemap cache")
            }
        }
        Ok(records)
    }

    async fn cache_is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age < self.options.cache_ttl)
            .unwrap_or(true)
    }

    async fn write(&self, filename: &str, body: String) -> Result<(), SitemapError> {
        let path = self.options.output_dir.join(filename);
        tokio::fs::write(&path, body)
            .await
            .map_err(|err| SitemapError::io(&path, err))
    }
}

async fn read_cache<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, String> {
    let bytes = tokio::fs::read(path).await.map_err(|err| err.to_string())?;
    serde_json::from_slice(&bytes).map_err(|err| err.to_string())
}

fn is_sitemap_file(name: &str) -> bool {
    name.starts_with("sitemap")
        && name.ends_with(".xml")
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn is_chunk_file(name: &str) -> bool {
    name.starts_with("sitemap-") && is_sitemap_file(name)
}

fn static_group(today: &str) -> UrlGroup {
    let entries = STATIC_PAGES
        .iter()
        .map(|path| SitemapEntry::new((*path).to_string(), today.to_string(), "1.0"))
        .collect();
    UrlGroup::new("static", entries)
}

fn sort_group(kind: ListingKind, today: &str) -> UrlGroup {
    let entries = kind
        .sort_options()
        .iter()
        .map(|order| {
            SitemapEntry::new(
                format!("{}?sortby={}", kind.path(), order.as_str()),
                today.to_string(),
                "0.8",
            )
        })
        .collect();
    UrlGroup::new(&format!("{kind}-sorting"), entries)
}

fn item_entry<T: Listed>(item: &T, today: &str) -> SitemapEntry {
    let mut entry = SitemapEntry::new(
        detail_path(T::KIND.as_str(), item.title(), item.id()),
        lastmod_or(item.updated_at(), today),
        "0.9",
    );
    entry.image = item
        .image_url()
        .filter(|url| !url.is_empty())
        .map(|url| SitemapImage {
            loc: url.to_string(),
            title: seo_title(item.title()),
        });
    entry
}

fn item_entries<T: Listed>(
    items: &[T],
    today: &str,
    seen: &mut HashSet<String>,
) -> Vec<SitemapEntry> {
    items
        .iter()
        .map(|item| item_entry(item, today))
        .filter(|entry| seen.insert(entry.path.clone()))
        .collect()
}

fn section_entries(hackathons: &[Hackathon], today: &str) -> Vec<SitemapEntry> {
    hackathons
        .iter()
        .flat_map(|hackathon| {
            let path = detail_path(
                ListingKind::Hackathons.as_str(),
                &hackathon.title,
                hackathon.id,
            );
            let lastmod = lastmod_or(&hackathon.updated_at, today);
            HACKATHON_SECTIONS.iter().map(move |section| {
                SitemapEntry::new(format!("{path}{section}"), lastmod.clone(), "0.8")
            })
        })
        .collect()
}

fn facet_entries(
    kind: ListingKind,
    source: &FacetSource,
    option: &FacetOption,
    today: &str,
) -> Vec<SitemapEntry> {
    let lastmod = lastmod_or(&option.updated_at, today);
    let mut entries = vec![SitemapEntry::new(
        format!("{}?{}={}", kind.path(), source.param, option.id),
        lastmod.clone(),
        source.sitemap_priority,
    )];
    if source.sitemap_name_variant {
        let name = url::form_urlencoded::byte_serialize(facet_name_slug(&option.name).as_bytes())
            .collect::<String>();
        entries.push(SitemapEntry::new(
            format!("{}?{}={}", kind.path(), source.param, name),
            lastmod,
            source.sitemap_priority,
        ));
    }
    entries
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// `YYYY-MM-DD` of an RFC 3339 timestamp or a plain date, else `fallback`.
pub fn lastmod_or(raw: &str, fallback: &str) -> String {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return format_date(parsed.to_offset(time::UtcOffset::UTC).date());
    }
    raw.get(..10)
        .and_then(|prefix| Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok())
        .map(format_date)
        .unwrap_or_else(|| fallback.to_string())
}

fn xml_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn absolute(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

pub fn render_urlset(base: &str, entries: &[SitemapEntry]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"{URLSET_NS}\" xmlns:image=\"{IMAGE_NS}\">\n"
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            xml_escape(&absolute(base, &entry.path))
        ));
        xml.push_str(&format!("    <lastmod>{}</lastmod>\n", entry.lastmod));
        xml.push_str(&format!("    <priority>{}</priority>\n", entry.priority));
        if let Some(image) = &entry.image {
            xml.push_str("    <image:image>\n");
            xml.push_str(&format!(
                "      <image:loc>{}</image:loc>\n",
                xml_escape(&image.loc)
            ));
            xml.push_str(&format!(
                "      <image:title>{}</image:title>\n",
                xml_escape(&image.title)
            ));
            xml.push_str("    </image:image>\n");
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn render_index(base: &str, files: &[String]) -> String {
    let mut xml =
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sitemapindex xmlns=\"{URLSET_NS}\">\n");
    for file in files {
        xml.push_str(&format!(
            "  <sitemap>\n    <loc>{}</loc>\n  </sitemap>\n",
            xml_escape(&absolute(base, &format!("/{file}")))
        ));
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hackathon(id: i64, title: &str) -> Hackathon {
        Hackathon {
            id,
            title: title.into(),
            thumbnail_url: Some("https://cdn.example.com/a.png?w=1&h=2".into()),
            updated_at: "2024-05-01T23:30:00-02:00".into(),
            ..Hackathon::default()
        }
    }

    #[test]
    fn lastmod_is_utc_date_with_fallback() {
        assert_eq!(lastmod_or("2024-05-01T23:30:00-02:00", "x"), "2024-05-02");
        assert_eq!(lastmod_or("2024-05-01 10:00:00", "x"), "2024-05-01");
        assert_eq!(lastmod_or("", "2024-01-01"), "2024-01-01");
    }

    #[test]
    fn urlset_escapes_and_includes_images() {
        let entry = item_entry(&hackathon(7, "Build & Ship"), "2024-01-01");
        assert_eq!(entry.path, "/hackathons/build-ship/7");
        let xml = render_urlset("https://devhub.xyz/", &[entry]);
        assert!(xml.contains("<loc>https://devhub.xyz/hackathons/build-ship/7</loc>"));
        assert!(xml.contains("<lastmod>2024-05-02</lastmod>"));
        assert!(xml.contains("<priority>0.9</priority>"));
        assert!(xml.contains("<image:loc>https://cdn.example.com/a.png?w=1&amp;h=2</image:loc>"));
        assert!(xml.contains("<image:title>Build%2B%26%2BShip</image:title>"));
    }

    #[test]
    fn item_urls_are_unique_across_groups() {
        let mut seen = HashSet::new();
        let first = item_entries(
            &[hackathon(1, "Alpha"), hackathon(1, "Alpha")],
            "2024-01-01",
            &mut seen,
        );
        assert_eq!(first.len(), 1);
        let again = item_entries(&[hackathon(1, "Alpha")], "2024-01-01", &mut seen);
        assert!(again.is_empty());
    }

    #[test]
    fn hackathon_facets_emit_id_and_name_forms() {
        let source = ListingKind::Hackathons
            .facet_sources()
            .iter()
            .find(|source| source.param == "location")
            .expect("location facet");
        let option = FacetOption {
            id: 4,
            name: "North America".into(),
            updated_at: "2024-02-02T00:00:00Z".into(),
            ..FacetOption::default()
        };
        let paths: Vec<String> = facet_entries(ListingKind::Hackathons, source, &option, "x")
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        assert_eq!(
            paths,
            vec!["/hackathons?location=4", "/hackathons?location=north-america"]
        );
    }

    #[test]
    fn sections_follow_each_hackathon() {
        let entries = section_entries(&[hackathon(3, "Gamma")], "x");
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].path, "/hackathons/gamma/3#overview");
        assert!(entries.iter().all(|entry| entry.priority == "0.8"));
    }

    #[test]
    fn index_lists_files_at_the_site_root() {
        let xml = render_index("https://devhub.xyz", &["sitemap-static-1.xml".into()]);
        assert!(xml.contains("<loc>https://devhub.xyz/sitemap-static-1.xml</loc>"));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sitemapindex"));
    }

    #[test]
    fn only_sitemap_files_are_served() {
        assert!(is_sitemap_file("sitemap.xml"));
        assert!(is_sitemap_file("sitemap-jobs-2.xml"));
        assert!(!is_sitemap_file("jobs-sitemap-cache.json"));
        assert!(!is_sitemap_file("sitemap-../../etc.xml"));
    }
}
