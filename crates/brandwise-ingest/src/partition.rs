//! Distribution of completed review files into per-brand partition files
//!
//! Each source file is claimed by renaming it to `processing_<name>`, read in
//! bounded chunks, appended group by group to its partition files, and finally
//! moved to the archive directory. A file still carrying the `processing_`
//! prefix therefore marks a distribution that did not finish; it is reported
//! and left for the operator, never picked up again automatically, because its
//! rows may already be partly in the partition files.
//!
//! The claim rename is collision avoidance between overlapping runs, not a
//! lock.

use crate::config::PartitionConfig;
use crate::error::{IngestError, Result};
use crate::progress::create_spinner;
use crate::record::{append_rows, RowRecord};
use brandwise_common::fs::FileNameSanitizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Prefix of a source file claimed by a distribution.
pub const STAGING_PREFIX: &str = "processing_";

/// File name used for a brand or category with no usable characters.
pub const UNKNOWN_PARTITION: &str = "Unknown";

/// File name for rows without a category in [`PartitionLayout::BrandCategory`].
pub const UNCATEGORIZED: &str = "Uncategorized";

/// How brand names are normalized into partition keys.
///
/// The normalized brand is also what lands in the `Brand` column of the
/// partition files, so every row of a file agrees with its key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BrandCasing {
    #[default]
    Lowercase,
    #[value(name = "titlecase")]
    TitleCase,
}

impl BrandCasing {
    pub fn apply(self, brand: &str) -> String {
        match self {
            Self::Lowercase => brand.to_lowercase(),
            Self::TitleCase => title_case(brand),
        }
    }
}

impl FromStr for BrandCasing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lowercase" | "lower" => Ok(Self::Lowercase),
            "titlecase" | "title-case" | "title" => Ok(Self::TitleCase),
            _ => Err(format!("Invalid brand casing: {s} (expected lowercase or titlecase)")),
        }
    }
}

impl fmt::Display for BrandCasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowercase => write!(f, "lowercase"),
            Self::TitleCase => write!(f, "titlecase"),
        }
    }
}

/// Directory layout of the partition root.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionLayout {
    /// `<root>/<brand>.csv`
    #[default]
    Brand,
    /// `<root>/<brand>/<category>.csv`
    BrandCategory,
}

impl FromStr for PartitionLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brand" => Ok(Self::Brand),
            "brand-category" | "brand_category" | "brandcategory" => Ok(Self::BrandCategory),
            _ => Err(format!("Invalid layout: {s} (expected brand or brand-category)")),
        }
    }
}

impl fmt::Display for PartitionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brand => write!(f, "brand"),
            Self::BrandCategory => write!(f, "brand-category"),
        }
    }
}

/// Upper-case every letter that follows a non-letter (or starts the string)
/// and lower-case every other letter: `"l'oréal PARIS"` becomes `"L'Oréal Paris"`.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut after_letter = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    out
}

/// Candidate source files found in the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceScan {
    /// Files to distribute, in name order
    pub sources: Vec<PathBuf>,
    /// `processing_*` files left by a distribution that did not finish
    pub incomplete: Vec<PathBuf>,
    /// Files whose staging name is taken by an incomplete distribution
    pub blocked: Vec<PathBuf>,
}

/// What a distribution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Source files fully distributed, at their archive location
    pub distributed: Vec<PathBuf>,
    /// Source files that disappeared before they could be claimed
    pub claimed_elsewhere: Vec<PathBuf>,
    pub incomplete: Vec<PathBuf>,
    pub blocked: Vec<PathBuf>,
    /// Rows appended to partition files
    pub rows: u64,
    /// Partition files written to
    pub partitions: BTreeSet<PathBuf>,
}

impl DistributionReport {
    /// Whether anything needs the operator's attention.
    pub fn needs_attention(&self) -> bool {
        !self.incomplete.is_empty() || !self.blocked.is_empty()
    }
}

pub struct PartitionEngine {
    config: PartitionConfig,
    sanitizer: FileNameSanitizer,
    show_progress: bool,
}

impl PartitionEngine {
    pub fn new(config: PartitionConfig) -> Result<Self> {
        if config.chunk_rows == 0 {
            return Err(IngestError::config("Chunk size must be greater than 0"));
        }

        Ok(Self {
            config,
            sanitizer: FileNameSanitizer::new()?,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// List the source directory without touching anything.
    ///
    /// The working file is never a source. Neither is a `processing_*` file:
    /// those are reported as incomplete, and a file whose staging name one of
    /// them occupies is reported as blocked.
    pub fn discover(&self) -> Result<SourceScan> {
        if !self.config.source_dir.is_dir() {
            return Ok(SourceScan::default());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".csv") && name != self.config.working_file_name {
                names.push(name);
            }
        }
        names.sort();

        let staged: HashSet<&str> = names
            .iter()
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .map(String::as_str)
            .collect();

        let mut scan = SourceScan::default();
        for name in &names {
            let path = self.config.source_dir.join(name);
            if staged.contains(name.as_str()) {
                scan.incomplete.push(path);
            } else if staged.contains(format!("{STAGING_PREFIX}{name}").as_str()) {
                scan.blocked.push(path);
            } else {
                scan.sources.push(path);
            }
        }

        Ok(scan)
    }

    /// Distribute every source file, then move it to the archive directory.
    ///
    /// Stops at the first file that cannot be claimed or archived
    /// ([`IngestError::Contention`]); files distributed before it stay done.
    pub fn distribute(&self) -> Result<DistributionReport> {
        std::fs::create_dir_all(&self.config.partition_dir)?;
        std::fs::create_dir_all(&self.config.archive_dir)?;

        let scan = self.discover()?;
        for path in &scan.incomplete {
            warn!(
                path = %path.display(),
                "Found a distribution that did not finish; check the partition files before removing the prefix"
            );
        }
        for path in &scan.blocked {
            warn!(path = %path.display(), "Skipping file: its staging name is taken");
        }
        info!(
            sources = scan.sources.len(),
            layout = %self.config.layout,
            casing = %self.config.casing,
            "Distributing review files"
        );

        let mut report = DistributionReport {
            incomplete: scan.incomplete,
            blocked: scan.blocked,
            ..DistributionReport::default()
        };

        let spinner = create_spinner("Distributing review files", self.show_progress);
        for source in scan.sources {
            let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            spinner.set_message(format!("Distributing {name}"));

            let staged = self.config.source_dir.join(format!("{STAGING_PREFIX}{name}"));
            match std::fs::rename(&source, &staged) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!(path = %source.display(), "Source file already claimed; skipping");
                    report.claimed_elsewhere.push(source);
                    continue;
                }
                Err(e) => {
                    spinner.abandon();
                    return Err(IngestError::contention(source, e));
                }
            }

            let rows = self
                .distribute_file(&staged, &mut report.partitions)
                .inspect_err(|_| spinner.abandon())?;

            let archived = self.config.archive_dir.join(&name);
            if let Err(e) = std::fs::rename(&staged, &archived) {
                spinner.abandon();
                return Err(IngestError::contention(staged, e));
            }

            info!(file = %name, rows, "Distributed review file");
            report.rows += rows;
            report.distributed.push(archived);
        }
        spinner.finish_and_clear();

        Ok(report)
    }

    /// Partition file for a normalized brand key and a category.
    pub fn partition_path(&self, brand_key: &str, category: &str) -> PathBuf {
        let root = &self.config.partition_dir;
        match self.config.layout {
            PartitionLayout::Brand => root.join(self.sanitizer.csv_name(brand_key, UNKNOWN_PARTITION)),
            PartitionLayout::BrandCategory => {
                let dir = match self.sanitizer.stem(brand_key) {
                    stem if stem.is_empty() => UNKNOWN_PARTITION.to_string(),
                    stem => stem,
                };
                root.join(dir)
                    .join(self.sanitizer.csv_name(category, UNCATEGORIZED))
            }
        }
    }

    fn distribute_file(&self, path: &Path, partitions: &mut BTreeSet<PathBuf>) -> Result<u64> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = reader.deserialize::<RowRecord>();
        let mut total = 0u64;

        loop {
            let chunk = records
                .by_ref()
                .take(self.config.chunk_rows)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if chunk.is_empty() {
                break;
            }
            total += chunk.len() as u64;
            self.write_chunk(chunk, partitions)?;
        }

        Ok(total)
    }

    fn write_chunk(&self, chunk: Vec<RowRecord>, partitions: &mut BTreeSet<PathBuf>) -> Result<()> {
        let mut groups: BTreeMap<PathBuf, Vec<RowRecord>> = BTreeMap::new();
        for mut row in chunk {
            row.brand = self.config.casing.apply(&row.brand);
            let target = self.partition_path(&row.brand, &row.category);
            groups.entry(target).or_default().push(row);
        }

        for (target, rows) in groups {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            append_rows(&target, &rows)?;
            debug!(partition = %target.display(), rows = rows.len(), "Appended group");
            partitions.insert(target);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::read_rows;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn engine(dir: &Path, layout: PartitionLayout, casing: BrandCasing) -> PartitionEngine {
        PartitionEngine::new(PartitionConfig {
            source_dir: dir.to_path_buf(),
            partition_dir: dir.join("Brands"),
            archive_dir: dir.join("Archives"),
            working_file_name: "Reviews.csv".to_string(),
            casing,
            layout,
            chunk_rows: 2,
        })
        .unwrap()
    }

    fn row(category: &str, brand: &str, product: &str) -> RowRecord {
        RowRecord {
            category: category.to_string(),
            brand: brand.to_string(),
            product: product.to_string(),
            ..RowRecord::default()
        }
    }

    #[test]
    fn test_title_case() {
        let cases = [
            ("l'oréal PARIS", "L'Oréal Paris"),
            ("MAC", "Mac"),
            ("too faced", "Too Faced"),
            ("3ina", "3Ina"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(title_case(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_casing_and_layout_parse() {
        assert_eq!("lowercase".parse::<BrandCasing>().unwrap(), BrandCasing::Lowercase);
        assert_eq!("TitleCase".parse::<BrandCasing>().unwrap(), BrandCasing::TitleCase);
        assert!("upper".parse::<BrandCasing>().is_err());
        assert_eq!(
            "brand-category".parse::<PartitionLayout>().unwrap(),
            PartitionLayout::BrandCategory
        );
        assert_eq!(PartitionLayout::BrandCategory.to_string(), "brand-category");
    }

    #[test]
    fn test_partition_path_layouts() {
        let dir = TempDir::new().unwrap();
        let flat = engine(dir.path(), PartitionLayout::Brand, BrandCasing::Lowercase);
        assert_eq!(
            flat.partition_path("l'oréal paris", "Lipstick"),
            dir.path().join("Brands").join("l_oréal_paris.csv")
        );

        let nested = engine(dir.path(), PartitionLayout::BrandCategory, BrandCasing::TitleCase);
        assert_eq!(
            nested.partition_path("Too Faced", "Eye Shadow"),
            dir.path().join("Brands").join("Too_Faced").join("Eye_Shadow.csv")
        );
        assert_eq!(
            nested.partition_path("Too Faced", ""),
            dir.path().join("Brands").join("Too_Faced").join("Uncategorized.csv")
        );
    }

    #[test]
    fn test_discover_classifies_files() {
        let dir = TempDir::new().unwrap();
        for name in [
            "Reviews.csv",
            "Reviews_2024_05_13_10_20.csv",
            "Reviews_2024_05_14_09_00.csv",
            "processing_Reviews_2024_05_14_09_00.csv",
            "processing_Reviews_2024_01_01_00_00.csv",
            "checkpoint.json",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let scan = engine(dir.path(), PartitionLayout::Brand, BrandCasing::Lowercase)
            .discover()
            .unwrap();

        assert_eq!(scan.sources, vec![dir.path().join("Reviews_2024_05_13_10_20.csv")]);
        assert_eq!(scan.blocked, vec![dir.path().join("Reviews_2024_05_14_09_00.csv")]);
        assert_eq!(scan.incomplete.len(), 2);
    }

    #[test]
    fn test_distribute_groups_by_normalized_brand() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Reviews_2024_05_13_10_20.csv");
        crate::record::append_rows(
            &source,
            &[
                row("Lipstick", "Glossier", "Balm"),
                row("Mascara", "GLOSSIER", "Lash"),
                row("Blush", "Milk", "Stick"),
            ],
        )
        .unwrap();

        let report = engine(dir.path(), PartitionLayout::Brand, BrandCasing::Lowercase)
            .distribute()
            .unwrap();

        assert_eq!(report.rows, 3);
        assert_eq!(report.partitions.len(), 2);
        assert!(!source.exists());
        assert!(dir.path().join("Archives/Reviews_2024_05_13_10_20.csv").is_file());

        let glossier = read_rows(&dir.path().join("Brands/glossier.csv")).unwrap();
        assert_eq!(glossier.len(), 2);
        assert!(glossier.iter().all(|r| r.brand == "glossier"));
        assert_eq!(glossier[0].product, "Balm");
    }

    proptest! {
        #[test]
        fn prop_title_case_is_idempotent(s in "[a-zA-Z '&-]{0,24}") {
            let once = title_case(&s);
            prop_assert_eq!(title_case(&once), once.clone());
        }

        #[test]
        fn prop_casings_agree_ignoring_case(s in "[a-zA-Z ]{0,24}") {
            prop_assert_eq!(
                BrandCasing::TitleCase.apply(&s).to_lowercase(),
                BrandCasing::Lowercase.apply(&s)
            );
        }
    }
}
