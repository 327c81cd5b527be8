//! `HH:MM` and `YYYY-MM-DD` wire formats.

use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time,
};

const HHMM: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
const HHMMSS: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const YMD: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const LOCAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const LOCAL_NO_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

pub fn format_hhmm(t: Time) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Accepts `HH:MM`, `HH:MM:SS` and single-digit hours such as `8:30`.
pub fn parse_hhmm(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = Time::parse(raw, HHMM).or_else(|_| Time::parse(raw, HHMMSS)) {
        return Some(t);
    }
    let (h, m) = raw.split_once(':')?;
    let m = m.split(':').next()?;
    Time::from_hms(h.trim().parse().ok()?, m.trim().parse().ok()?, 0).ok()
}

pub fn parse_ymd(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), YMD).ok()
}

pub fn format_ymd(d: Date) -> String {
    d.format(YMD).unwrap_or_else(|_| d.to_string())
}

pub fn format_local(dt: PrimitiveDateTime) -> String {
    dt.format(LOCAL).unwrap_or_else(|_| dt.to_string())
}

/// Wall-clock timestamp. An RFC 3339 value keeps its own wall-clock fields
/// and drops the offset.
pub fn parse_local(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    PrimitiveDateTime::parse(raw, LOCAL)
        .or_else(|_| PrimitiveDateTime::parse(raw, LOCAL_NO_SECONDS))
        .ok()
        .or_else(|| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .ok()
                .map(|odt| PrimitiveDateTime::new(odt.date(), odt.time()))
        })
}

pub mod local {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(dt: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_local(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PrimitiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_local(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
    }

    pub mod option {
        use serde::{de::Error, Deserialize, Deserializer};
        use time::PrimitiveDateTime;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PrimitiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) => super::super::parse_local(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`"))),
            }
        }
    }
}

pub mod hhmm {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::Time;

    pub fn serialize<S: Serializer>(t: &Time, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_hhmm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Time, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hhmm(&raw).ok_or_else(|| D::Error::custom(format!("invalid time `{raw}`, expected HH:MM")))
    }

    pub mod option {
        use serde::{de::Error, Deserialize, Deserializer, Serializer};
        use time::Time;

        pub fn serialize<S: Serializer>(t: &Option<Time>, s: S) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => s.serialize_str(&super::super::format_hhmm(*t)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Time>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::super::parse_hhmm(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid time `{raw}`, expected HH:MM"))),
            }
        }
    }
}

pub mod ymd {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(d: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ymd(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_ymd(&raw).ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`, expected YYYY-MM-DD")))
    }

    pub mod option {
        use serde::{de::Error, Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(d: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_str(&super::super::format_ymd(*d)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) => super::super::parse_ymd(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`, expected YYYY-MM-DD"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    #[test]
    fn lenient_time_parsing() {
        assert_eq!(parse_hhmm("08:00"), Some(time!(08:00)));
        assert_eq!(parse_hhmm("8:05"), Some(time!(08:05)));
        assert_eq!(parse_hhmm(" 21:30:15 "), Some(time!(21:30:15)));
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_hhmm("dinner"), None);
        assert_eq!(parse_hhmm(""), None);
        assert_eq!(format_hhmm(time!(07:05:59)), "07:05");
    }

    #[test]
    fn dates_round_trip() {
        let d = date!(2026 - 01 - 31);
        assert_eq!(format_ymd(d), "2026-01-31");
        assert_eq!(parse_ymd("2026-01-31"), Some(d));
        assert_eq!(parse_ymd("31/01/2026"), None);
    }

    #[test]
    fn local_timestamps_accept_naive_and_offset_forms() {
        let expected = datetime!(2026-03-10 12:30);
        assert_eq!(parse_local("2026-03-10T12:30:00"), Some(expected));
        assert_eq!(parse_local("2026-03-10T12:30"), Some(expected));
        assert_eq!(parse_local("2026-03-10T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_local("yesterday"), None);
        assert_eq!(format_local(expected), "2026-03-10T12:30:00");
    }
}
