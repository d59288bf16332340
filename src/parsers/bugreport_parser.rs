use std::collections::BTreeMap;
use std::io::BufRead;

use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use tracing::{debug, warn};

use super::section_splitter::SectionSplitter;
use super::{
    ActivityServiceParser, DumpsysParser, KernelLogParser, LogcatParser, MemInfoParser, Parser,
    ProcrankParser, SystemPropsParser, TopParser, TracesParser,
};
use crate::config::ParserConfig;
use crate::error::Result;
use crate::item::{BugreportItem, LogcatEvent, LogcatItem, ProcrankItem, TracesItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BugreportSection {
    Header,
    MemInfo,
    Procrank,
    Top,
    SystemProps,
    SystemLog,
    Traces,
    KernelLog,
    LastKmsg,
    Dumpsys,
    ActivityService,
    Noop,
}

const SECTION_PATTERNS: &[(BugreportSection, &str)] = &[
    (BugreportSection::MemInfo, r"^------ MEMORY INFO .*"),
    (BugreportSection::Procrank, r"^------ PROCRANK .*"),
    (BugreportSection::Top, r"^------ CPU INFO .*"),
    (BugreportSection::SystemProps, r"^------ SYSTEM PROPERTIES .*"),
    (BugreportSection::SystemLog, r"^------ SYSTEM LOG .*"),
    (BugreportSection::SystemLog, r"^------ MAIN LOG .*"),
    (BugreportSection::SystemLog, r"^------ MAIN AND SYSTEM LOG .*"),
    (BugreportSection::Traces, r"^------ VM TRACES AT LAST ANR .*"),
    (BugreportSection::KernelLog, r"^------ KERNEL LOG .*"),
    (BugreportSection::LastKmsg, r"^------ LAST KMSG .*"),
    (BugreportSection::Dumpsys, r"^------ DUMPSYS .*"),
    (BugreportSection::ActivityService, r"^------ APP SERVICES .*"),
    // Unknown sections and the duration trailers dumpstate prints after each one.
    (BugreportSection::Noop, r"^------ .* ------$"),
];

/// Parses a whole bugreport (`dumpstate` output) into a [`BugreportItem`].
///
/// The input is split into `------ NAME (command) ------` sections and each
/// known section goes to its own parser as soon as it ends. The logcat year is
/// taken from the `== dumpstate:` header unless the configuration pins one.
/// After the last line the sections are cross-referenced: logcat events with
/// no app get a name from procrank, and the last ANR trace dump is attached to
/// the most recent matching ANR.
pub struct BugreportParser {
    splitter: SectionSplitter<BugreportSection>,
    dumpstate: Regex,
    command_line: Regex,
    year_pinned: bool,
    mem_info_parser: MemInfoParser,
    procrank_parser: ProcrankParser,
    top_parser: TopParser,
    system_props_parser: SystemPropsParser,
    logcat_parser: LogcatParser,
    traces_parser: TracesParser,
    kernel_log_parser: KernelLogParser,
    dumpsys_parser: DumpsysParser,
    activity_service_parser: ActivityServiceParser,
}

impl Default for BugreportParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Bugreport Parser")
    }
}

impl BugreportParser {
    pub fn new() -> Result<Self> {
        Self::from_config(&ParserConfig::default())
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let mut splitter = SectionSplitter::new(Some(BugreportSection::Header));
        for (section, pattern) in SECTION_PATTERNS {
            splitter.register(*section, pattern)?;
        }

        Ok(BugreportParser {
            splitter,
            dumpstate: Regex::new(r"^== dumpstate: (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})")?,
            command_line: Regex::new(r"^Command line: (.*)$")?,
            year_pinned: config.logcat.year.is_some(),
            mem_info_parser: MemInfoParser::new()?,
            procrank_parser: ProcrankParser::new()?,
            top_parser: TopParser::new()?,
            system_props_parser: SystemPropsParser::new()?,
            logcat_parser: LogcatParser::from_config(config)?,
            traces_parser: TracesParser::new()?,
            kernel_log_parser: KernelLogParser::from_config(config)?,
            dumpsys_parser: DumpsysParser::new()?,
            activity_service_parser: ActivityServiceParser::new()?,
        })
    }

    /// Streams `lines` through the section splitter and commits the result.
    fn parse_lines<I, S>(&self, lines: I) -> Result<Option<BugreportItem>>
    where
        I: IntoIterator<Item = std::io::Result<S>>,
        S: AsRef<str>,
    {
        let mut state = BugreportState::new(self);
        let mut seen_content = false;
        {
            let mut run = self.splitter.start(|section, block| state.on_section(section, block));
            for line in lines {
                let line = line?;
                let line = line.as_ref();
                seen_content |= !line.trim().is_empty();
                run.feed(line)?;
            }
            run.finish()?;
        }

        if !seen_content {
            debug!("Bugreport input is blank");
            return Ok(None);
        }
        Ok(Some(state.commit()))
    }

    fn parse_header(&self, block: &[String], item: &mut BugreportItem) {
        for line in block {
            if let Some(caps) = self.dumpstate.captures(line) {
                item.time = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S").ok();
            } else if let Some(caps) = self.command_line.captures(line) {
                item.command_line = parse_command_line(&caps[1]);
            }
        }
    }
}

/// Splits a kernel command line into `key=value` pairs. Flags without a value
/// map to an empty string.
fn parse_command_line(text: &str) -> BTreeMap<String, String> {
    text.split_whitespace()
        .map(|arg| match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (arg.to_string(), String::new()),
        })
        .collect()
}

impl Parser for BugreportParser {
    type Item = BugreportItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<BugreportItem> {
        match self.parse_lines(lines.iter().map(Ok::<_, std::io::Error>)) {
            Ok(item) => item,
            Err(e) => {
                warn!("Bugreport parse failed: {}", e);
                None
            }
        }
    }

    fn parse_reader<R: BufRead>(&self, reader: R) -> Result<Option<BugreportItem>> {
        self.parse_lines(reader.lines())
    }
}

/// Per-parse state of a [`BugreportParser`].
struct BugreportState<'a> {
    parser: &'a BugreportParser,
    item: BugreportItem,
    logcat_parser: Option<LogcatParser>,
    traces: Option<TracesItem>,
}

impl<'a> BugreportState<'a> {
    fn new(parser: &'a BugreportParser) -> Self {
        BugreportState {
            parser,
            item: BugreportItem::default(),
            logcat_parser: None,
            traces: None,
        }
    }

    fn on_section(&mut self, section: BugreportSection, block: Vec<String>) -> Result<()> {
        let parser = self.parser;
        match section {
            BugreportSection::Header => {
                parser.parse_header(&block, &mut self.item);
                if !parser.year_pinned {
                    if let Some(time) = self.item.time {
                        self.logcat_parser = Some(parser.logcat_parser.for_year(time.year()));
                    }
                }
            }
            BugreportSection::MemInfo => {
                replace(section, &mut self.item.mem_info, parser.mem_info_parser.parse(&block))
            }
            BugreportSection::Procrank => {
                replace(section, &mut self.item.procrank, parser.procrank_parser.parse(&block))
            }
            BugreportSection::Top => replace(section, &mut self.item.top, parser.top_parser.parse(&block)),
            BugreportSection::SystemProps => replace(
                section,
                &mut self.item.system_props,
                parser.system_props_parser.parse(&block),
            ),
            BugreportSection::SystemLog => {
                let logcat_parser = self.logcat_parser.as_ref().unwrap_or(&parser.logcat_parser);
                replace(section, &mut self.item.system_log, logcat_parser.parse(&block))
            }
            BugreportSection::Traces => replace(section, &mut self.traces, parser.traces_parser.parse(&block)),
            BugreportSection::KernelLog => replace(
                section,
                &mut self.item.kernel_log,
                parser.kernel_log_parser.parse(&block),
            ),
            BugreportSection::LastKmsg => replace(
                section,
                &mut self.item.last_kmsg,
                parser.kernel_log_parser.parse(&block),
            ),
            BugreportSection::Dumpsys => {
                replace(section, &mut self.item.dumpsys, parser.dumpsys_parser.parse(&block))
            }
            BugreportSection::ActivityService => replace(
                section,
                &mut self.item.activity_service,
                parser.activity_service_parser.parse(&block),
            ),
            BugreportSection::Noop => {}
        }
        Ok(())
    }

    fn commit(mut self) -> BugreportItem {
        if let (Some(logcat), Some(procrank)) = (self.item.system_log.as_mut(), self.item.procrank.as_ref()) {
            name_apps(logcat, procrank);
        }
        if let (Some(logcat), Some(traces)) = (self.item.system_log.as_mut(), self.traces.as_ref()) {
            attach_trace(logcat, traces);
        }
        self.item
    }
}

fn replace<T>(section: BugreportSection, slot: &mut Option<T>, value: Option<T>) {
    let Some(value) = value else {
        return;
    };
    if slot.is_some() {
        warn!("Section {:?} appears more than once, keeping the last one", section);
    }
    *slot = Some(value);
}

/// Fills in the app of logcat events that only carry a pid.
fn name_apps(logcat: &mut LogcatItem, procrank: &ProcrankItem) {
    for event in &mut logcat.events {
        let base = event.base_mut();
        if base.app.is_some() {
            continue;
        }
        if let Some(name) = base.pid.and_then(|pid| procrank.process_name(pid)) {
            base.app = Some(name.to_string());
        }
    }
}

/// Gives the traces stack to the most recent ANR of the same app that has none.
fn attach_trace(logcat: &mut LogcatItem, traces: &TracesItem) {
    let (Some(app), Some(stack)) = (traces.app.as_deref(), traces.stack.as_ref()) else {
        return;
    };
    let anr = logcat.events.iter_mut().rev().find_map(|event| match event {
        LogcatEvent::Anr(anr) if anr.base.app.as_deref() == Some(app) && anr.trace.is_none() => Some(anr),
        _ => None,
    });
    match anr {
        Some(anr) => anr.trace = Some(stack.clone()),
        None => debug!("No ANR for {} to attach traces to", app),
    }
}
