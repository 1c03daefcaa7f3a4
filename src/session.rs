use tracing::{debug, info, warn};

use crate::apply::apply;
use crate::console::Console;
use crate::decision::{Action, Answer, GateAnswer, Mode, Phase, PhaseMachine};
use crate::diff::summarize_change;
use crate::error::{ReplaceError, ReplaceResult};
use crate::highlight::{Highlight, Renderer, hidden_matches};
use crate::locate::{Located, locate};
use crate::logging::{ChangeLog, ChangeLogEntry};
use crate::matcher::{Matcher, build_matcher, ensure_token_free};
use crate::safety::{WordGuard, is_safe};
use crate::store::{ComponentFilter, StringKey, StringQuery, StringStore, TranslatableString};

/// Everything one replacement run needs to know, as given by the operator.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub lang: String,
    pub components: Vec<String>,
    pub search: Option<String>,
    pub replacement: Option<String>,
    pub regex: bool,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub assume_yes: bool,
    pub assume_no: bool,
}

impl SessionConfig {
    pub fn mode(&self) -> ReplaceResult<Mode> {
        match (self.assume_yes, self.assume_no) {
            (true, true) => Err(ReplaceError::config(
                "--yes and --no cannot be used together",
            )),
            (true, false) => Ok(Mode::AssumeYes),
            (false, true) => Ok(Mode::AssumeNo),
            (false, false) => Ok(Mode::Interactive),
        }
    }
}

/// Collaborators a session runs against.
pub struct SessionContext<'a> {
    pub store: &'a mut dyn StringStore,
    pub console: &'a mut dyn Console,
    pub renderer: Renderer,
    pub change_log: Option<&'a ChangeLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub matched: usize,
    pub dropped: usize,
    pub safe: usize,
    pub dangerous: usize,
    pub applied: usize,
    pub skipped: usize,
    pub untouched: usize,
    pub committed: bool,
}

impl SessionReport {
    pub fn summary_line(&self) -> String {
        format!(
            "replace summary: matched={}, applied={}, skipped={}, untouched={}, dropped={}, committed={}",
            self.matched, self.applied, self.skipped, self.untouched, self.dropped, self.committed
        )
    }
}

/// A fetched record paired with the field it matched on.
struct Candidate {
    record: TranslatableString,
    located: Located,
}

struct Prepared {
    matcher: Box<dyn Matcher>,
    components: ComponentFilter,
    guard: WordGuard,
    mode: Mode,
}

fn prepare(config: &SessionConfig) -> ReplaceResult<Prepared> {
    let mode = config.mode()?;
    let search = config
        .search
        .as_deref()
        .filter(|search| !search.is_empty())
        .ok_or_else(|| ReplaceError::config("a search term is required"))?;
    let replacement = config
        .replacement
        .as_deref()
        .ok_or_else(|| ReplaceError::config("a replacement is required"))?;
    if config.lang.trim().is_empty() {
        return Err(ReplaceError::config("a language is required"));
    }
    ensure_token_free("search", search)?;
    ensure_token_free("replacement", replacement)?;
    if config.regex && (config.prefix.is_some() || config.suffix.is_some()) {
        warn!("--prefix/--suffix only apply to literal searches; ignoring");
    }
    let matcher = build_matcher(search, replacement, config.regex)?;
    let components = ComponentFilter::new(&config.components)
        .map_err(|err| ReplaceError::config(err.to_string()))?;
    Ok(Prepared {
        matcher,
        components,
        guard: WordGuard::new(config.prefix.as_deref(), config.suffix.as_deref()),
        mode,
    })
}

/// Runs a full replacement session: checkout, classification, the safe and
/// dangerous passes, and the final commit gate.
pub fn run_session(
    config: &SessionConfig,
    ctx: &mut SessionContext<'_>,
) -> ReplaceResult<SessionReport> {
    let prepared = prepare(config)?;
    let lang = config.lang.as_str();

    if !ctx.store.languages()?.contains(lang) {
        return Err(ReplaceError::UnknownLanguage(lang.to_string()));
    }
    if prepared.matcher.is_regex() && !ctx.store.supports_regex() {
        return Err(ReplaceError::RegexUnsupported);
    }

    ctx.store.checkout(lang)?;
    info!(lang, "checked out");

    let records = ctx.store.fetch_matching(&StringQuery {
        lang,
        components: &prepared.components,
        matcher: prepared.matcher.as_ref(),
    })?;
    if records.is_empty() {
        release_unused(&mut *ctx.store, lang)?;
        return Err(ReplaceError::NoMatches(prepared.matcher.pattern().to_string()));
    }

    let mut report = SessionReport::default();
    let (safe, dangerous) = classify(records, &prepared, &mut report);
    if report.matched == 0 {
        release_unused(&mut *ctx.store, lang)?;
        return Err(ReplaceError::NoMatches(prepared.matcher.pattern().to_string()));
    }
    ctx.console.print_line(&format!(
        "found {} matching strings in '{lang}' (components: {}): {} safe, {} to review",
        report.matched,
        prepared.components.describe(),
        report.safe,
        report.dangerous
    ))?;

    let mut session = Session {
        ctx: &mut *ctx,
        prepared: &prepared,
        report: &mut report,
        position: 0,
    };
    session.run_phase(Phase::Safe, &safe)?;
    if !dangerous.is_empty() {
        session.ctx.console.print_line(&format!(
            "{} match(es) are part of a longer word and may be unsafe to replace",
            dangerous.len()
        ))?;
    }
    session.run_phase(Phase::Dangerous, &dangerous)?;
    session.final_gate(lang)?;

    ctx.console.print_line(&report.summary_line())?;
    Ok(report)
}

/// Drops a checkout that holds no edits, so a later session starts from
/// the current store instead of a stale snapshot.
fn release_unused(store: &mut dyn StringStore, lang: &str) -> ReplaceResult<bool> {
    if store.pending_edits() > 0 {
        return Ok(false);
    }
    store.discard(lang)?;
    debug!(lang, "released checkout without edits");
    Ok(true)
}

fn classify(
    records: Vec<TranslatableString>,
    prepared: &Prepared,
    report: &mut SessionReport,
) -> (Vec<Candidate>, Vec<Candidate>) {
    let mut safe = Vec::new();
    let mut dangerous = Vec::new();
    for record in records {
        let Some(located) = locate(&record, prepared.matcher.as_ref()) else {
            debug!(key = %record.key(), "match only inside protected markup; dropping");
            report.dropped += 1;
            continue;
        };
        let is_safe_match = match prepared.matcher.safety_term() {
            Some(literal) => is_safe(located.masked.text(), literal, &prepared.guard),
            None => true,
        };
        let candidate = Candidate { record, located };
        if is_safe_match {
            safe.push(candidate);
        } else {
            dangerous.push(candidate);
        }
    }
    report.safe = safe.len();
    report.dangerous = dangerous.len();
    report.matched = safe.len() + dangerous.len();
    (safe, dangerous)
}

struct Session<'s, 'c> {
    ctx: &'s mut SessionContext<'c>,
    prepared: &'s Prepared,
    report: &'s mut SessionReport,
    position: usize,
}

impl Session<'_, '_> {
    fn run_phase(&mut self, phase: Phase, candidates: &[Candidate]) -> ReplaceResult<()> {
        let mut machine = PhaseMachine::new(phase, self.prepared.mode);
        let style = match phase {
            Phase::Safe => Highlight::Accept,
            Phase::Dangerous => Highlight::Danger,
        };

        for (index, candidate) in candidates.iter().enumerate() {
            self.position += 1;
            self.show(candidate, style)?;

            let action = match machine.automatic_action() {
                Some(action) => action,
                None => self.ask(&mut machine)?,
            };
            match action {
                Action::Accept => self.accept(candidate)?,
                Action::Skip => {
                    self.report.skipped += 1;
                    self.ctx.console.print_line("  skipped")?;
                    self.log(candidate, "skipped", "-0/+0 words");
                }
                Action::Abort => {
                    let remaining = candidates.len() - index;
                    self.report.untouched += remaining;
                    self.position += remaining - 1;
                    self.ctx.console.print_line(&format!(
                        "stopping the {} pass; {remaining} match(es) left untouched",
                        phase.label()
                    ))?;
                    self.log(candidate, "aborted", "-0/+0 words");
                    break;
                }
            }
        }
        Ok(())
    }

    fn show(&mut self, candidate: &Candidate, style: Highlight) -> ReplaceResult<()> {
        let regex = self.prepared.matcher.is_regex();
        let renderer = self.ctx.renderer;
        let located = &candidate.located;
        let header = format!(
            "[{}/{}] {}/{} ({})",
            self.position,
            self.report.matched,
            candidate.record.component,
            candidate.record.stringid,
            located.field
        );
        self.ctx.console.print_line(&header)?;
        self.ctx
            .console
            .print_line(&format!("  found:   {}", renderer.found(located, regex)))?;
        let hidden = hidden_matches(located, regex);
        let more = if hidden > 0 {
            format!(" (+{hidden} more match(es), also replaced)")
        } else {
            String::new()
        };
        self.ctx.console.print_line(&format!(
            "  becomes: {}{more}",
            renderer.would_become(located, regex, style)
        ))?;
        Ok(())
    }

    fn ask(&mut self, machine: &mut PhaseMachine) -> ReplaceResult<Action> {
        let phase = machine.phase();
        loop {
            let prompt = format!("Replace? [{}] ", phase.alphabet());
            let Some(input) = self.ctx.console.prompt_line(&prompt)? else {
                debug!("input closed; stopping pass");
                machine.stop();
                return Ok(Action::Abort);
            };
            match Answer::parse(&input, phase) {
                Ok(answer) => return Ok(machine.answer(answer)),
                Err(err) => {
                    self.ctx
                        .console
                        .print_line(&format!("{err}. {}", phase.help()))?;
                }
            }
        }
    }

    fn accept(&mut self, candidate: &Candidate) -> ReplaceResult<()> {
        let outcome = apply(&candidate.record, &candidate.located, &mut *self.ctx.store)?;
        self.report.applied += 1;
        debug!(key = %outcome.record.key(), before = ?outcome.before, after = %outcome.after, "replaced");
        self.ctx.console.print_line("  replaced")?;
        let summary = summarize_change(&candidate.located.subject, &outcome.after);
        self.log(candidate, "applied", &summary);
        Ok(())
    }

    fn log(&self, candidate: &Candidate, action: &str, summary: &str) {
        let Some(change_log) = self.ctx.change_log else {
            return;
        };
        let StringKey {
            lang,
            component,
            stringid,
        } = candidate.record.key();
        let entry = ChangeLogEntry {
            timestamp: String::new(),
            lang,
            component,
            stringid,
            field: candidate.located.field.to_string(),
            action: action.to_string(),
            summary: summary.to_string(),
        };
        if let Err(err) = change_log.record(entry) {
            warn!(error = %err, "failed to append to change log");
        }
    }

    fn final_gate(&mut self, lang: &str) -> ReplaceResult<()> {
        let decision = match GateAnswer::automatic(self.prepared.mode) {
            Some(answer) => answer,
            None => self.ask_gate(lang)?,
        };
        match decision {
            GateAnswer::Commit => {
                self.ctx.store.checkin(lang)?;
                self.report.committed = true;
                info!(lang, applied = self.report.applied, "checked in");
                self.ctx.console.print_line(&format!(
                    "checked in {} replacement(s) for '{lang}'",
                    self.report.applied
                ))?;
            }
            GateAnswer::Abandon => {
                if release_unused(&mut *self.ctx.store, lang)? {
                    self.ctx
                        .console
                        .print_line(&format!("nothing to check in; released '{lang}'"))?;
                } else {
                    self.ctx.console.print_line(&format!(
                        "not checking in; '{lang}' stays checked out with {} pending edit(s)",
                        self.ctx.store.pending_edits()
                    ))?;
                }
            }
        }
        Ok(())
    }

    fn ask_gate(&mut self, lang: &str) -> ReplaceResult<GateAnswer> {
        loop {
            let prompt = format!(
                "Check in {} replacement(s) for '{lang}'? [{}] ",
                self.report.applied,
                GateAnswer::ALPHABET
            );
            let Some(input) = self.ctx.console.prompt_line(&prompt)? else {
                return Ok(GateAnswer::Abandon);
            };
            match GateAnswer::parse(&input) {
                Ok(answer) => return Ok(answer),
                Err(err) => {
                    self.ctx.console.print_line(&format!(
                        "{err}. y = publish the changes, n = leave them checked out"
                    ))?;
                }
            }
        }
    }
}
