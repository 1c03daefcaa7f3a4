use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::matcher::Matcher;

/// One customisable string of one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableString {
    pub lang: String,
    pub component: String,
    pub stringid: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default)]
    pub local: Option<String>,
}

impl TranslatableString {
    pub fn key(&self) -> StringKey {
        StringKey {
            lang: self.lang.clone(),
            component: self.component.clone(),
            stringid: self.stringid.clone(),
        }
    }

    fn has_key(&self, key: &StringKey) -> bool {
        self.lang == key.lang && self.component == key.component && self.stringid == key.stringid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StringKey {
    pub lang: String,
    pub component: String,
    pub stringid: String,
}

impl fmt::Display for StringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} [{}]", self.component, self.stringid, self.lang)
    }
}

pub struct StringQuery<'a> {
    pub lang: &'a str,
    pub components: &'a ComponentFilter,
    pub matcher: &'a dyn Matcher,
}

/// Component name globs; an empty filter accepts every component.
#[derive(Debug, Clone)]
pub struct ComponentFilter {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl ComponentFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::all());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|err| anyhow!("invalid component pattern '{pattern}': {err}"))?;
            builder.add(glob);
        }
        Ok(Self {
            patterns: patterns.to_vec(),
            set: Some(builder.build()?),
        })
    }

    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            set: None,
        }
    }

    pub fn accepts(&self, component: &str) -> bool {
        self.set.as_ref().is_none_or(|set| set.is_match(component))
    }

    pub fn describe(&self) -> String {
        if self.patterns.is_empty() {
            "(all)".to_string()
        } else {
            self.patterns.join(", ")
        }
    }
}

/// The storage collaborator a replacement session runs against.
pub trait StringStore {
    fn languages(&self) -> Result<BTreeSet<String>>;

    fn supports_regex(&self) -> bool {
        true
    }

    fn checkout(&mut self, lang: &str) -> Result<()>;

    /// Records of the query language whose `local`, `master` or `original`
    /// matches, ordered by component then string id.
    fn fetch_matching(&self, query: &StringQuery<'_>) -> Result<Vec<TranslatableString>>;

    fn persist_local(&mut self, record: &TranslatableString) -> Result<()>;

    fn checkin(&mut self, lang: &str) -> Result<()>;

    fn discard(&mut self, lang: &str) -> Result<()>;

    /// Number of records written through the current checkout.
    fn pending_edits(&self) -> usize;
}

pub fn select_matching<'a, I>(records: I, query: &StringQuery<'_>) -> Vec<TranslatableString>
where
    I: IntoIterator<Item = &'a TranslatableString>,
{
    let mut selected: Vec<TranslatableString> = records
        .into_iter()
        .filter(|record| record.lang == query.lang)
        .filter(|record| query.components.accepts(&record.component))
        .filter(|record| {
            [
                record.local.as_deref(),
                record.master.as_deref(),
                Some(record.original.as_str()),
            ]
            .into_iter()
            .flatten()
            .any(|text| query.matcher.is_match(text))
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        a.component
            .cmp(&b.component)
            .then_with(|| a.stringid.cmp(&b.stringid))
    });
    selected
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    pub strings: Vec<TranslatableString>,
    /// Keys whose `local` was written during a checkout. Only these are
    /// published on checkin.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edited: Vec<StringKey>,
}

impl StoreDocument {
    fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("reading store {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parsing store {}", path.display()))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        write_via_temp(path, &data).with_context(|| format!("writing {}", path.display()))
    }

    /// Takes over the edited values of an earlier working copy. Every other
    /// record keeps the value it has in the main document now.
    fn carry_edits_from(&mut self, pending: &StoreDocument) {
        for key in &pending.edited {
            let Some(previous) = pending.strings.iter().find(|record| record.has_key(key)) else {
                continue;
            };
            let Some(current) = self.strings.iter_mut().find(|record| record.has_key(key)) else {
                continue;
            };
            current.local.clone_from(&previous.local);
            self.edited.push(key.clone());
        }
    }
}

struct WorkingCopy {
    lang: String,
    path: PathBuf,
    document: StoreDocument,
}

/// A JSON file of strings. Edits go to a per-language working copy that
/// sits next to the store until it is checked in or discarded.
pub struct JsonStore {
    path: PathBuf,
    working: Option<WorkingCopy>,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("string store {} does not exist", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
            working: None,
        })
    }

    pub fn working_path(&self, lang: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("strings.json");
        self.path.with_file_name(format!("{name}.{lang}.checkout"))
    }

    pub fn has_pending(&self, lang: &str) -> bool {
        self.working_path(lang).exists()
    }

    fn working_for(&self, lang: &str) -> Result<&WorkingCopy> {
        self.working
            .as_ref()
            .filter(|working| working.lang == lang)
            .ok_or_else(|| anyhow!("language '{lang}' is not checked out"))
    }
}

impl StringStore for JsonStore {
    fn languages(&self) -> Result<BTreeSet<String>> {
        let document = StoreDocument::load(&self.path)?;
        Ok(document.strings.into_iter().map(|record| record.lang).collect())
    }

    fn checkout(&mut self, lang: &str) -> Result<()> {
        let path = self.working_path(lang);
        let main = StoreDocument::load(&self.path)?;
        let mut document = StoreDocument {
            strings: main
                .strings
                .into_iter()
                .filter(|record| record.lang == lang)
                .collect(),
            edited: Vec::new(),
        };
        if path.exists() {
            document.carry_edits_from(&StoreDocument::load(&path)?);
            info!(
                path = %path.display(),
                edits = document.edited.len(),
                "resuming pending checkout"
            );
        } else {
            debug!(path = %path.display(), "created working copy");
        }
        document.save(&path)?;
        self.working = Some(WorkingCopy {
            lang: lang.to_string(),
            path,
            document,
        });
        Ok(())
    }

    fn fetch_matching(&self, query: &StringQuery<'_>) -> Result<Vec<TranslatableString>> {
        let working = self.working_for(query.lang)?;
        Ok(select_matching(&working.document.strings, query))
    }

    fn persist_local(&mut self, record: &TranslatableString) -> Result<()> {
        let key = record.key();
        let working = self
            .working
            .as_mut()
            .filter(|working| working.lang == key.lang)
            .ok_or_else(|| anyhow!("language '{}' is not checked out", key.lang))?;
        let stored = working
            .document
            .strings
            .iter_mut()
            .find(|candidate| candidate.has_key(&key))
            .ok_or_else(|| anyhow!("string {key} is not in the working copy"))?;
        stored.local.clone_from(&record.local);
        if !working.document.edited.contains(&key) {
            working.document.edited.push(key.clone());
        }
        working.document.save(&working.path)?;
        debug!(%key, "persisted local value");
        Ok(())
    }

    fn checkin(&mut self, lang: &str) -> Result<()> {
        let working = match self.working.take() {
            Some(working) if working.lang == lang => working,
            other => {
                self.working = other;
                let path = self.working_path(lang);
                if !path.exists() {
                    bail!("nothing checked out for language '{lang}'");
                }
                WorkingCopy {
                    lang: lang.to_string(),
                    document: StoreDocument::load(&path)?,
                    path,
                }
            }
        };

        let mut main = StoreDocument::load(&self.path)?;
        let mut updated = 0usize;
        for record in main.strings.iter_mut().filter(|record| record.lang == lang) {
            let key = record.key();
            if !working.document.edited.contains(&key) {
                continue;
            }
            if let Some(edited) = working
                .document
                .strings
                .iter()
                .find(|candidate| candidate.has_key(&key))
            {
                if record.local != edited.local {
                    record.local.clone_from(&edited.local);
                    updated += 1;
                }
            }
        }
        if updated > 0 {
            create_backup(&self.path)?;
            main.save(&self.path)?;
        }
        fs::remove_file(&working.path)
            .with_context(|| format!("removing working copy {}", working.path.display()))?;
        info!(lang, updated, "checked in");
        Ok(())
    }

    fn discard(&mut self, lang: &str) -> Result<()> {
        if self.working.as_ref().is_some_and(|working| working.lang == lang) {
            self.working = None;
        }
        let path = self.working_path(lang);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("removing working copy {}", path.display()))?;
        }
        Ok(())
    }

    fn pending_edits(&self) -> usize {
        self.working
            .as_ref()
            .map_or(0, |working| working.document.edited.len())
    }
}

fn create_backup(path: &Path) -> Result<PathBuf> {
    let mut attempt = 0usize;
    loop {
        let candidate = backup_candidate(path, attempt);
        if !candidate.exists() {
            fs::copy(path, &candidate)
                .with_context(|| format!("creating backup {}", candidate.display()))?;
            return Ok(candidate);
        }
        attempt += 1;
    }
}

fn backup_candidate(path: &Path, index: usize) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("strings.json");
    let suffix = if index == 0 {
        ".bak".to_string()
    } else {
        format!(".bak{index}")
    };
    path.with_file_name(format!("{name}{suffix}"))
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".langsweep-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

/// In-memory store used by session tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub strings: Vec<TranslatableString>,
    pub regex_capable: bool,
    pub checked_out: Option<String>,
    pub checked_in: Vec<String>,
    pub writes: Vec<StringKey>,
    pub discarded: Vec<String>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new(strings: Vec<TranslatableString>) -> Self {
        Self {
            strings,
            regex_capable: true,
            ..Self::default()
        }
    }

    pub fn local_of(&self, stringid: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|record| record.stringid == stringid)
            .and_then(|record| record.local.as_deref())
    }
}

#[cfg(test)]
impl StringStore for MemoryStore {
    fn languages(&self) -> Result<BTreeSet<String>> {
        Ok(self.strings.iter().map(|record| record.lang.clone()).collect())
    }

    fn supports_regex(&self) -> bool {
        self.regex_capable
    }

    fn checkout(&mut self, lang: &str) -> Result<()> {
        self.checked_out = Some(lang.to_string());
        Ok(())
    }

    fn fetch_matching(&self, query: &StringQuery<'_>) -> Result<Vec<TranslatableString>> {
        if self.checked_out.as_deref() != Some(query.lang) {
            bail!("fetch before checkout");
        }
        Ok(select_matching(&self.strings, query))
    }

    fn persist_local(&mut self, record: &TranslatableString) -> Result<()> {
        if self.fail_writes {
            bail!("disk full");
        }
        let key = record.key();
        let stored = self
            .strings
            .iter_mut()
            .find(|candidate| candidate.has_key(&key))
            .ok_or_else(|| anyhow!("unknown string {key}"))?;
        stored.local.clone_from(&record.local);
        self.writes.push(key);
        Ok(())
    }

    fn checkin(&mut self, lang: &str) -> Result<()> {
        self.checked_in.push(lang.to_string());
        Ok(())
    }

    fn discard(&mut self, lang: &str) -> Result<()> {
        self.checked_out = None;
        self.discarded.push(lang.to_string());
        Ok(())
    }

    fn pending_edits(&self) -> usize {
        self.writes.len()
    }
}

#[cfg(test)]
pub fn sample(component: &str, stringid: &str, local: &str) -> TranslatableString {
    TranslatableString {
        lang: "en".to_string(),
        component: component.to_string(),
        stringid: stringid.to_string(),
        original: local.to_string(),
        master: Some(local.to_string()),
        local: Some(local.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::LiteralMatcher;
    use tempfile::tempdir;

    fn write_store(dir: &Path, strings: Vec<TranslatableString>) -> PathBuf {
        let path = dir.join("strings.json");
        StoreDocument {
            strings,
            ..StoreDocument::default()
        }
        .save(&path)
        .unwrap();
        path
    }

    fn record(lang: &str, component: &str, stringid: &str, text: &str) -> TranslatableString {
        TranslatableString {
            lang: lang.to_string(),
            component: component.to_string(),
            stringid: stringid.to_string(),
            original: text.to_string(),
            master: None,
            local: None,
        }
    }

    #[test]
    fn fetch_filters_and_orders() {
        let temp = tempdir().unwrap();
        let path = write_store(
            temp.path(),
            vec![
                record("en", "mod_quiz", "b", "course b"),
                record("en", "core", "z", "course z"),
                record("en", "mod_quiz", "a", "course a"),
                record("de", "core", "y", "course y"),
                record("en", "core", "n", "nothing here"),
            ],
        );
        let mut store = JsonStore::open(&path).unwrap();
        store.checkout("en").unwrap();
        let matcher = LiteralMatcher::new("course", "subject").unwrap();
        let components = ComponentFilter::all();
        let query = StringQuery {
            lang: "en",
            components: &components,
            matcher: &matcher,
        };
        let ids: Vec<_> = store
            .fetch_matching(&query)
            .unwrap()
            .into_iter()
            .map(|record| format!("{}:{}", record.component, record.stringid))
            .collect();
        assert_eq!(ids, ["core:z", "mod_quiz:a", "mod_quiz:b"]);

        let only_mods = ComponentFilter::new(&["mod_*".to_string()]).unwrap();
        let query = StringQuery {
            lang: "en",
            components: &only_mods,
            matcher: &matcher,
        };
        assert_eq!(store.fetch_matching(&query).unwrap().len(), 2);
    }

    #[test]
    fn fetch_requires_checkout() {
        let temp = tempdir().unwrap();
        let path = write_store(temp.path(), vec![record("en", "core", "a", "course")]);
        let store = JsonStore::open(&path).unwrap();
        let matcher = LiteralMatcher::new("course", "x").unwrap();
        let components = ComponentFilter::all();
        let query = StringQuery {
            lang: "en",
            components: &components,
            matcher: &matcher,
        };
        assert!(store.fetch_matching(&query).is_err());
    }

    #[test]
    fn persisted_edits_reach_main_document_on_checkin() {
        let temp = tempdir().unwrap();
        let path = write_store(
            temp.path(),
            vec![
                record("en", "core", "a", "course"),
                record("de", "core", "a", "Kurs"),
            ],
        );
        let mut store = JsonStore::open(&path).unwrap();
        store.checkout("en").unwrap();
        assert!(store.has_pending("en"));

        let mut edited = record("en", "core", "a", "course");
        edited.local = Some("subject".to_string());
        store.persist_local(&edited).unwrap();

        let untouched = StoreDocument::load(&path).unwrap();
        assert!(untouched.strings.iter().all(|record| record.local.is_none()));

        store.checkin("en").unwrap();
        assert!(!store.has_pending("en"));
        let published = StoreDocument::load(&path).unwrap();
        assert_eq!(published.strings[0].local.as_deref(), Some("subject"));
        assert_eq!(published.strings[1].local, None);
        assert!(temp.path().join("strings.json.bak").exists());
    }

    #[test]
    fn pending_checkout_survives_and_can_be_checked_in_later() {
        let temp = tempdir().unwrap();
        let path = write_store(temp.path(), vec![record("en", "core", "a", "course")]);
        {
            let mut store = JsonStore::open(&path).unwrap();
            store.checkout("en").unwrap();
            let mut edited = record("en", "core", "a", "course");
            edited.local = Some("subject".to_string());
            store.persist_local(&edited).unwrap();
        }

        let mut resumed = JsonStore::open(&path).unwrap();
        assert!(resumed.has_pending("en"));
        resumed.checkin("en").unwrap();
        let published = StoreDocument::load(&path).unwrap();
        assert_eq!(published.strings[0].local.as_deref(), Some("subject"));
    }

    #[test]
    fn checkin_publishes_only_edited_records() {
        let temp = tempdir().unwrap();
        let path = write_store(
            temp.path(),
            vec![
                record("en", "core", "a", "course"),
                record("en", "core", "b", "hello"),
            ],
        );
        let mut store = JsonStore::open(&path).unwrap();
        store.checkout("en").unwrap();

        let mut main = StoreDocument::load(&path).unwrap();
        main.strings[1].local = Some("hello world".to_string());
        main.save(&path).unwrap();

        let mut edited = record("en", "core", "a", "course");
        edited.local = Some("subject".to_string());
        store.persist_local(&edited).unwrap();
        assert_eq!(store.pending_edits(), 1);
        store.checkin("en").unwrap();

        let published = StoreDocument::load(&path).unwrap();
        assert_eq!(published.strings[0].local.as_deref(), Some("subject"));
        assert_eq!(published.strings[1].local.as_deref(), Some("hello world"));
        assert!(published.edited.is_empty());
    }

    #[test]
    fn resumed_checkout_refreshes_records_it_never_edited() {
        let temp = tempdir().unwrap();
        let path = write_store(
            temp.path(),
            vec![
                record("en", "core", "a", "course"),
                record("en", "core", "b", "hello"),
            ],
        );
        {
            let mut store = JsonStore::open(&path).unwrap();
            store.checkout("en").unwrap();
            let mut edited = record("en", "core", "a", "course");
            edited.local = Some("subject".to_string());
            store.persist_local(&edited).unwrap();
        }
        let mut main = StoreDocument::load(&path).unwrap();
        main.strings[1].local = Some("hello world".to_string());
        main.save(&path).unwrap();

        let mut resumed = JsonStore::open(&path).unwrap();
        resumed.checkout("en").unwrap();
        assert_eq!(resumed.pending_edits(), 1);
        let working = resumed.working_for("en").unwrap();
        assert_eq!(working.document.strings[0].local.as_deref(), Some("subject"));
        assert_eq!(working.document.strings[1].local.as_deref(), Some("hello world"));

        resumed.checkin("en").unwrap();
        let published = StoreDocument::load(&path).unwrap();
        assert_eq!(published.strings[0].local.as_deref(), Some("subject"));
        assert_eq!(published.strings[1].local.as_deref(), Some("hello world"));
    }

    #[test]
    fn discard_drops_working_copy() {
        let temp = tempdir().unwrap();
        let path = write_store(temp.path(), vec![record("en", "core", "a", "course")]);
        let mut store = JsonStore::open(&path).unwrap();
        store.checkout("en").unwrap();
        store.discard("en").unwrap();
        assert!(!store.has_pending("en"));
        assert!(store.checkin("en").is_err());
    }

    #[test]
    fn languages_lists_every_code() {
        let temp = tempdir().unwrap();
        let path = write_store(
            temp.path(),
            vec![record("en", "core", "a", "x"), record("fr", "core", "a", "x")],
        );
        let store = JsonStore::open(&path).unwrap();
        let langs: Vec<_> = store.languages().unwrap().into_iter().collect();
        assert_eq!(langs, ["en", "fr"]);
    }

    #[test]
    fn invalid_component_glob_is_rejected() {
        assert!(ComponentFilter::new(&["[".to_string()]).is_err());
    }
}
