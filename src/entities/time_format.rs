use anyhow::{Result, anyhow};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Locale, TimeZone, Utc};
use std::fmt::{Display, Write};

use super::chat::MessageTime;

/// Renders the time-of-day part of a message timestamp in the viewer's locale.
#[derive(Debug, Clone, Copy)]
pub struct TimeFormatter {
    locale: Locale,
    offset: Option<FixedOffset>,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(Locale::en_US)
    }
}

impl TimeFormatter {
    /// Format in the system's local time zone.
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            offset: None,
        }
    }

    /// Build from a locale name such as `en_US` or `de_DE`. Locales whose time
    /// format chrono cannot render are rejected here rather than at display time.
    pub fn from_locale_name(name: &str) -> Result<Self> {
        let locale =
            Locale::try_from(name).map_err(|_| anyhow!("Unknown locale: {}", name))?;

        let parses = StrftimeItems::new_with_locale("%X", locale)
            .all(|item| !matches!(item, Item::Error));
        let rendered = DateTime::<Utc>::UNIX_EPOCH.format_localized("%X", locale);
        if !parses || String::new().write_fmt(format_args!("{}", rendered)).is_err() {
            return Err(anyhow!("Locale {} has no usable time format", name));
        }

        Ok(Self::new(locale))
    }

    /// Pin the display zone to a fixed UTC offset instead of the local zone.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_offset_minutes(self, minutes: i32) -> Result<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("UTC offset out of range: {} minutes", minutes))?;
        Ok(self.with_offset(offset))
    }

    pub fn format(&self, timestamp: &MessageTime) -> String {
        let instant = match timestamp {
            MessageTime::Parsed(instant) => instant,
            MessageTime::Unparsed(raw) => return raw.clone(),
        };

        match self.offset {
            Some(offset) => self.time_of_day(&instant.with_timezone(&offset)),
            None => self.time_of_day(&instant.with_timezone(&Local)),
        }
    }

    fn time_of_day<Tz>(&self, instant: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut label = String::new();
        if write!(label, "{}", instant.format_localized("%X", self.locale)).is_ok() {
            return label;
        }

        tracing::debug!("Locale {:?} failed to format, using 24h clock", self.locale);
        label.clear();
        // Plain numeric items always render.
        let _ = write!(label, "{}", instant.format("%H:%M:%S"));
        label
    }
}
