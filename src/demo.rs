//! Usage quotas for the shared demo key.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use crate::config::DemoLimits;
use crate::error::{DocGenError, Result};
use crate::render::RenderFormat;

/// Files, archives and source bytes documented so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Files sent for documentation
    pub files: usize,
    /// Archives documented
    pub archives: usize,
    /// Source bytes sent for documentation
    pub bytes: u64,
}

/// Demo usage of this server session, shown on `/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoStatus {
    /// Usage since the server started
    pub session: UsageCounters,
    /// Usage today
    pub daily: UsageCounters,
    /// Limits in force
    pub limits: DemoLimits,
}

/// Tracks demo usage against [`DemoLimits`]; daily counters reset on a new day
#[derive(Debug, Clone)]
pub struct DemoUsage {
    limits: DemoLimits,
    day: NaiveDate,
    session: UsageCounters,
    daily: UsageCounters,
}

impl DemoUsage {
    /// Starts tracking with empty counters
    pub fn new(limits: DemoLimits) -> Self {
        Self {
            limits,
            day: today(),
            session: UsageCounters::default(),
            daily: UsageCounters::default(),
        }
    }

    /// Limits in force
    pub fn limits(&self) -> &DemoLimits {
        &self.limits
    }

    /// Checks that one more archive of `size` bytes is allowed
    pub fn check_archive(&mut self, size: u64) -> Result<()> {
        self.roll_day(today());
        if self.daily.archives >= self.limits.max_daily_archives {
            return Err(limit(format!(
                "{} archives per day",
                self.limits.max_daily_archives
            )));
        }
        if self.session.archives >= self.limits.max_session_archives {
            return Err(limit(format!(
                "{} archives per session",
                self.limits.max_session_archives
            )));
        }
        if size > self.limits.max_file_size_bytes() {
            return Err(limit(format!(
                "archive of {} bytes is larger than the demo limit of {} MB",
                size, self.limits.max_file_size_mb
            )));
        }
        Ok(())
    }

    /// Checks that documenting `files` files totalling `bytes` stays within the quotas
    pub fn check_files(&mut self, files: usize, bytes: u64) -> Result<()> {
        self.roll_day(today());
        if self.daily.files + files > self.limits.max_daily_files {
            return Err(limit(format!(
                "{} files requested, {} of {} left today",
                files,
                self.limits.max_daily_files.saturating_sub(self.daily.files),
                self.limits.max_daily_files
            )));
        }
        if self.session.files + files > self.limits.max_session_files {
            return Err(limit(format!(
                "{} files requested, {} of {} left in this session",
                files,
                self.limits.max_session_files.saturating_sub(self.session.files),
                self.limits.max_session_files
            )));
        }
        if self.daily.bytes.saturating_add(bytes) > self.limits.max_daily_size_bytes() {
            return Err(limit(format!(
                "{} bytes would exceed the daily {} MB",
                bytes, self.limits.max_daily_size_mb
            )));
        }
        Ok(())
    }

    /// Checks that results may be exported as `format`
    pub fn check_export(&self, format: RenderFormat) -> Result<()> {
        if self.limits.allows_export(format) {
            Ok(())
        } else {
            let allowed: Vec<String> = self.limits.export_formats.iter().map(|f| f.to_string()).collect();
            Err(limit(format!(
                "export format {} is not available in demo mode, use {}",
                format,
                allowed.join(", ")
            )))
        }
    }

    /// Counts a documented run
    pub fn record(&mut self, files: usize, bytes: u64, archive: bool) {
        self.roll_day(today());
        for counters in [&mut self.session, &mut self.daily] {
            counters.files += files;
            counters.bytes = counters.bytes.saturating_add(bytes);
            if archive {
                counters.archives += 1;
            }
        }
    }

    /// Current counters and limits
    pub fn status(&self) -> DemoStatus {
        DemoStatus {
            session: self.session,
            daily: self.daily,
            limits: self.limits.clone(),
        }
    }

    fn roll_day(&mut self, day: NaiveDate) {
        if day != self.day {
            self.day = day;
            self.daily = UsageCounters::default();
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn limit(message: String) -> DocGenError {
    DocGenError::LimitExceeded(format!("Demo limit reached: {}", message))
}
