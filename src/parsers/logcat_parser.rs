use std::collections::HashMap;
use std::io::BufRead;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use tracing::debug;

use super::java_crash_parser::SYSTEM_SERVER;
use super::preamble::Preamble;
use super::{AnrParser, JavaCrashParser, NativeCrashParser, Parser};
use crate::config::ParserConfig;
use crate::error::Result;
use crate::item::{LogcatEvent, LogcatItem, MiscLogcatItem};

pub const ANR: &str = "ANR";
pub const JAVA_CRASH: &str = "JAVA_CRASH";
pub const NATIVE_CRASH: &str = "NATIVE_CRASH";
pub const HIGH_CPU_USAGE: &str = "HIGH_CPU_USAGE";
pub const HIGH_MEMORY_USAGE: &str = "HIGH_MEMORY_USAGE";
pub const RUNTIME_RESTART: &str = "RUNTIME_RESTART";

const THREADTIME_LINE: &str = r"^(\d{2})-(\d{2})\s+(\d{2}):(\d{2}):(\d{2})\.(\d{3})\s+(?:\S+\s+)?(\d+)\s+(\d+)\s+([A-Z])\s+(.+?)\s*: ?(.*)$";
const TIME_LINE: &str = r"^(\d{2})-(\d{2})\s+(\d{2}):(\d{2}):(\d{2})\.(\d{3})\s+([A-Z])/(.+?)\(\s*(\d+)\): ?(.*)$";

/// Events that span several lines of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Anr,
    JavaCrash,
    NativeCrash,
}

#[derive(Debug, Clone)]
struct BlockTag {
    level: char,
    tag: String,
    kind: BlockKind,
    category: String,
}

#[derive(Debug, Clone)]
struct LinePattern {
    message: Option<Regex>,
    level: Option<char>,
    tag: String,
    category: String,
}

impl LinePattern {
    fn matches(&self, line: &LogcatLine) -> bool {
        self.tag == line.tag
            && self.level.map_or(true, |level| level == line.level)
            && self
                .message
                .as_ref()
                .map_or(true, |message| message.is_match(&line.message))
    }
}

/// One parsed logcat line.
#[derive(Debug, Clone, PartialEq)]
struct LogcatLine {
    time: NaiveDateTime,
    pid: u32,
    tid: Option<u32>,
    level: char,
    tag: String,
    message: String,
}

/// Parses `logcat -v threadtime` (optionally with a uid column) and
/// `logcat -v time` output into a [`LogcatItem`].
///
/// ANRs, Java crashes and native crashes are collected per (pid, tid, level,
/// tag) and handed to their parsers once the input ends. Single-line events
/// come from registered patterns. Event collection pauses between a
/// `ShutdownThread` reboot line and the next `--------- beginning of` line.
#[derive(Debug, Clone)]
pub struct LogcatParser {
    year: i32,
    last_preamble: usize,
    process_preamble: usize,
    threadtime: Regex,
    time: Regex,
    reboot: Regex,
    reboot_resume: Regex,
    main_entry: Regex,
    patterns: Vec<LinePattern>,
    block_tags: Vec<BlockTag>,
    anr_parser: AnrParser,
    java_crash_parser: JavaCrashParser,
    native_crash_parser: NativeCrashParser,
}

impl Default for LogcatParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Logcat Parser")
    }
}

impl LogcatParser {
    /// A parser assuming the current year.
    pub fn new() -> Result<Self> {
        Self::with_year(Local::now().year())
    }

    pub fn with_year(year: i32) -> Result<Self> {
        let mut parser = LogcatParser {
            year,
            last_preamble: 15,
            process_preamble: 15,
            threadtime: Regex::new(THREADTIME_LINE)?,
            time: Regex::new(TIME_LINE)?,
            reboot: Regex::new(r"^Rebooting, reason: ")?,
            reboot_resume: Regex::new(r"--------- beginning of ")?,
            main_entry: Regex::new(r"^Calling main entry (\S+)")?,
            patterns: Vec::new(),
            block_tags: Vec::new(),
            anr_parser: AnrParser::new()?,
            java_crash_parser: JavaCrashParser::new()?,
            native_crash_parser: NativeCrashParser::new()?,
        };

        parser.add_block_tag('E', "ActivityManager", BlockKind::Anr, ANR);
        parser.add_block_tag('I', "ActivityManager", BlockKind::Anr, ANR);
        parser.add_block_tag('E', "AndroidRuntime", BlockKind::JavaCrash, JAVA_CRASH);
        parser.add_block_tag('I', "DEBUG", BlockKind::NativeCrash, NATIVE_CRASH);
        parser.add_block_tag('F', "DEBUG", BlockKind::NativeCrash, NATIVE_CRASH);

        parser.add_pattern(
            Some(r"obtainBuffer timed out \(is the CPU pegged\?\).*"),
            None,
            "AudioTrack",
            HIGH_CPU_USAGE,
        )?;
        parser.add_pattern(
            Some(r"GetBufferLock timed out for thread \d+ buffer .*"),
            None,
            "gralloc",
            HIGH_MEMORY_USAGE,
        )?;
        parser.add_pattern(
            Some(r"\*\*\* WATCHDOG KILLING SYSTEM PROCESS.*"),
            None,
            "Watchdog",
            RUNTIME_RESTART,
        )?;
        Ok(parser)
    }

    /// Builds a parser with the built-in patterns plus everything in `config`.
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let mut parser = match config.logcat.year {
            Some(year) => Self::with_year(year)?,
            None => Self::new()?,
        };
        parser.last_preamble = config.preamble.last_preamble;
        parser.process_preamble = config.preamble.process_preamble;
        for pattern in &config.logcat.patterns {
            parser.add_pattern(
                pattern.message.as_deref(),
                pattern.level,
                &pattern.tag,
                &pattern.category,
            )?;
        }
        for tag in &config.logcat.java_crash_tags {
            parser.add_java_crash_tag(tag.level, &tag.tag, &tag.category);
        }
        Ok(parser)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// A copy of this parser assuming `year`.
    pub fn for_year(&self, year: i32) -> Self {
        LogcatParser {
            year,
            ..self.clone()
        }
    }

    /// Registers a single-line event. `message` must match the whole message;
    /// `None` for `message` or `level` matches anything. The first registered
    /// pattern matching a line wins.
    pub fn add_pattern(
        &mut self,
        message: Option<&str>,
        level: Option<char>,
        tag: &str,
        category: &str,
    ) -> Result<()> {
        let message = message
            .map(|pattern| Regex::new(&format!("^(?:{})$", pattern)))
            .transpose()?;
        self.patterns.push(LinePattern {
            message,
            level,
            tag: tag.to_string(),
            category: category.to_string(),
        });
        Ok(())
    }

    /// Parses lines with `level` and `tag` as Java crashes reported under `category`.
    pub fn add_java_crash_tag(&mut self, level: char, tag: &str, category: &str) {
        self.add_block_tag(level, tag, BlockKind::JavaCrash, category);
    }

    fn add_block_tag(&mut self, level: char, tag: &str, kind: BlockKind, category: &str) {
        self.block_tags.push(BlockTag {
            level,
            tag: tag.to_string(),
            kind,
            category: category.to_string(),
        });
    }

    fn block_tag(&self, level: char, tag: &str) -> Option<&BlockTag> {
        self.block_tags
            .iter()
            .find(|block_tag| block_tag.level == level && block_tag.tag == tag)
    }

    fn is_block_start(&self, kind: BlockKind, message: &str) -> bool {
        match kind {
            BlockKind::Anr => self.anr_parser.is_start(message),
            BlockKind::JavaCrash => self.java_crash_parser.is_start(message),
            BlockKind::NativeCrash => self.native_crash_parser.is_start(message),
        }
    }

    /// Lines whose date does not exist in the assumed year (`02-29` outside a
    /// leap year) are skipped.
    fn parse_line(&self, line: &str) -> Option<LogcatLine> {
        if let Some(caps) = self.threadtime.captures(line) {
            return Some(LogcatLine {
                time: self.timestamp(&caps, line)?,
                pid: caps[7].parse().ok()?,
                tid: caps[8].parse().ok(),
                level: caps[9].chars().next()?,
                tag: caps[10].to_string(),
                message: caps[11].to_string(),
            });
        }
        let caps = self.time.captures(line)?;
        Some(LogcatLine {
            time: self.timestamp(&caps, line)?,
            pid: caps[9].parse().ok()?,
            tid: None,
            level: caps[7].chars().next()?,
            tag: caps[8].trim().to_string(),
            message: caps[10].to_string(),
        })
    }

    /// Groups 1 to 6 are month, day, hour, minute, second and millisecond.
    fn timestamp(&self, caps: &Captures<'_>, line: &str) -> Option<NaiveDateTime> {
        let field = |index: usize| caps[index].parse::<u32>().ok();
        let time = NaiveDate::from_ymd_opt(self.year, field(1)?, field(2)?)
            .and_then(|date| date.and_hms_milli_opt(field(3)?, field(4)?, field(5)?, field(6)?));
        if time.is_none() {
            debug!("Skipping logcat line with no valid date in {}: {}", self.year, line);
        }
        time
    }

    fn start(&self) -> LogcatState<'_> {
        LogcatState {
            parser: self,
            item: None,
            preamble: Preamble::new(self.last_preamble, self.process_preamble),
            rebooting: false,
            entries: Vec::new(),
            open_blocks: HashMap::new(),
            main_entries: HashMap::new(),
        }
    }

    fn finish_block(&self, block: Block, main_entries: &HashMap<u32, String>) -> Option<LogcatEvent> {
        let mut event = match block.kind {
            BlockKind::Anr => LogcatEvent::Anr(self.anr_parser.parse(&block.lines)?),
            BlockKind::JavaCrash => LogcatEvent::JavaCrash(self.java_crash_parser.parse(&block.lines)?),
            BlockKind::NativeCrash => {
                LogcatEvent::NativeCrash(self.native_crash_parser.parse(&block.lines)?)
            }
        };

        let base = event.base_mut();
        // A pid named in the report beats the one from the line header.
        if base.pid.is_none() {
            base.pid = Some(block.pid);
            base.tid = block.tid;
        }
        if base.app.as_deref() == Some(SYSTEM_SERVER) {
            if let Some(name) = base.pid.and_then(|pid| main_entries.get(&pid)) {
                base.app = Some(name.clone());
            }
        }
        base.event_time = Some(block.time);
        base.tag = Some(block.tag);
        base.category = Some(block.category);
        base.last_preamble = Some(block.last_preamble);
        base.process_preamble = Some(block.process_preamble);
        Some(event)
    }
}

impl Parser for LogcatParser {
    type Item = LogcatItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<LogcatItem> {
        let mut state = self.start();
        for line in lines {
            state.feed(line.as_ref());
        }
        state.finish()
    }

    fn parse_reader<R: BufRead>(&self, reader: R) -> Result<Option<LogcatItem>> {
        let mut state = self.start();
        for line in reader.lines() {
            state.feed(&line?);
        }
        Ok(state.finish())
    }
}

/// Lines of one multi-line event.
#[derive(Debug)]
struct Block {
    kind: BlockKind,
    category: String,
    tag: String,
    time: NaiveDateTime,
    pid: u32,
    tid: Option<u32>,
    lines: Vec<String>,
    last_preamble: String,
    process_preamble: String,
}

#[derive(Debug)]
enum Entry {
    Event(LogcatEvent),
    Block(Block),
}

type BlockKey = (u32, Option<u32>, char, String);

/// Per-parse state of a [`LogcatParser`].
struct LogcatState<'a> {
    parser: &'a LogcatParser,
    item: Option<LogcatItem>,
    preamble: Preamble,
    rebooting: bool,
    /// Events and blocks in the order they started.
    entries: Vec<Entry>,
    open_blocks: HashMap<BlockKey, usize>,
    /// `Calling main entry` class per pid, names system-process crashes.
    main_entries: HashMap<u32, String>,
}

impl LogcatState<'_> {
    fn feed(&mut self, raw: &str) {
        let Some(line) = self.parser.parse_line(raw) else {
            if self.parser.reboot_resume.is_match(raw) {
                self.rebooting = false;
            }
            return;
        };

        self.item
            .get_or_insert_with(LogcatItem::default)
            .observe_time(line.time);

        if line.tag == "ShutdownThread" && self.parser.reboot.is_match(&line.message) {
            self.rebooting = true;
            self.open_blocks.clear();
        } else if !self.rebooting {
            self.collect(&line);
        }
        self.preamble.push(Some(line.pid), raw);
    }

    fn collect(&mut self, line: &LogcatLine) {
        let parser = self.parser;

        if line.tag == "AndroidRuntime" {
            if let Some(caps) = parser.main_entry.captures(&line.message) {
                self.main_entries.insert(line.pid, caps[1].to_string());
            }
        }

        if let Some(pattern) = parser.patterns.iter().find(|pattern| pattern.matches(line)) {
            self.entries.push(Entry::Event(LogcatEvent::Misc(MiscLogcatItem {
                event_time: Some(line.time),
                pid: Some(line.pid),
                tid: line.tid,
                app: None,
                tag: Some(line.tag.clone()),
                category: Some(pattern.category.clone()),
                stack: Some(line.message.clone()),
                last_preamble: Some(self.preamble.recent()),
                process_preamble: Some(self.preamble.for_pid(line.pid)),
            })));
        }

        let Some(block_tag) = parser.block_tag(line.level, &line.tag) else {
            return;
        };
        let key: BlockKey = (line.pid, line.tid, line.level, line.tag.clone());
        let starts_block = parser.is_block_start(block_tag.kind, &line.message);
        let index = match self.open_blocks.get(&key) {
            Some(&index) if !starts_block => index,
            _ => {
                self.entries.push(Entry::Block(Block {
                    kind: block_tag.kind,
                    category: block_tag.category.clone(),
                    tag: line.tag.clone(),
                    time: line.time,
                    pid: line.pid,
                    tid: line.tid,
                    lines: Vec::new(),
                    last_preamble: self.preamble.recent(),
                    process_preamble: self.preamble.for_pid(line.pid),
                }));
                let index = self.entries.len() - 1;
                self.open_blocks.insert(key, index);
                index
            }
        };
        if let Some(Entry::Block(block)) = self.entries.get_mut(index) {
            block.lines.push(line.message.clone());
        }
    }

    fn finish(self) -> Option<LogcatItem> {
        let mut item = self.item?;
        for entry in self.entries {
            let event = match entry {
                Entry::Event(event) => Some(event),
                Entry::Block(block) => self.parser.finish_block(block, &self.main_entries),
            };
            item.events.extend(event);
        }
        Some(item)
    }
}
