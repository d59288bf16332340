use std::convert::Infallible;
use std::fmt::Debug;
use std::mem;

use tracing::debug;

use super::pattern_matcher::PatternMatcher;
use crate::error::Result;

/// Splits a line stream into sections delimited by registered marker lines.
///
/// One section is active at a time (initially the optional header section).
/// A marker line for a different section flushes the lines buffered so far to
/// the callback, tagged with the active section, and makes the new section
/// active. Marker lines themselves are not buffered. A marker for the section
/// that is already active is buffered like an ordinary line: splitting
/// repeated sub-entries is up to the section's parser. Lines seen while no
/// section is active are dropped. End of input flushes the last section.
///
/// The splitter only holds its patterns; each call to [`SectionSplitter::start`]
/// gets fresh state, so one splitter can serve any number of parses.
#[derive(Debug, Clone)]
pub struct SectionSplitter<K> {
    matcher: PatternMatcher<K>,
    header: Option<K>,
}

impl<K: Copy + PartialEq + Debug> SectionSplitter<K> {
    /// `header` is active before the first marker line.
    pub fn new(header: Option<K>) -> Self {
        SectionSplitter {
            matcher: PatternMatcher::new(),
            header,
        }
    }

    pub fn register(&mut self, section: K, pattern: &str) -> Result<()> {
        self.matcher.register(section, pattern)
    }

    /// Starts a parse. `on_section` receives every flushed section in input
    /// order; an error from it aborts the parse.
    pub fn start<F, E>(&self, on_section: F) -> SplitRun<'_, K, F>
    where
        F: FnMut(K, Vec<String>) -> std::result::Result<(), E>,
    {
        SplitRun {
            matcher: &self.matcher,
            active: self.header,
            block: Vec::new(),
            on_section,
        }
    }

    /// Runs a whole line sequence through [`SectionSplitter::start`].
    pub fn split<I, S, F, E>(&self, lines: I, on_section: F) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(K, Vec<String>) -> std::result::Result<(), E>,
    {
        let mut run = self.start(on_section);
        for line in lines {
            run.feed(line.as_ref())?;
        }
        run.finish()
    }

    /// Collects every flushed section of `lines` in input order.
    pub fn sections<I, S>(&self, lines: I) -> Vec<(K, Vec<String>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sections = Vec::new();
        let result = self.split(lines, |section, block| {
            sections.push((section, block));
            Ok::<(), Infallible>(())
        });
        match result {
            Ok(()) => sections,
            Err(never) => match never {},
        }
    }
}

/// Per-parse state of a [`SectionSplitter`].
pub struct SplitRun<'a, K, F> {
    matcher: &'a PatternMatcher<K>,
    active: Option<K>,
    block: Vec<String>,
    on_section: F,
}

impl<K, F, E> SplitRun<'_, K, F>
where
    K: Copy + PartialEq + Debug,
    F: FnMut(K, Vec<String>) -> std::result::Result<(), E>,
{
    pub fn feed(&mut self, line: &str) -> std::result::Result<(), E> {
        match self.matcher.match_line(line).copied() {
            Some(section) if Some(section) != self.active => {
                self.flush()?;
                self.active = Some(section);
            }
            _ => {
                if self.active.is_some() {
                    self.block.push(line.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> std::result::Result<(), E> {
        self.flush()
    }

    fn flush(&mut self) -> std::result::Result<(), E> {
        let block = mem::take(&mut self.block);
        match self.active {
            Some(section) => {
                debug!("Flushing section {:?} ({} lines)", section, block.len());
                (self.on_section)(section, block)
            }
            None => Ok(()),
        }
    }
}
