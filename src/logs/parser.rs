//! Parsing of forwarded log datagrams
//!
//! A datagram carries the four-byte marker, a one-byte packet-type
//! indicator ('R' for remote logs), then the literal log text:
//! `MM/DD/YYYY - HH:MM:SS: <message>`. Pure parsing, no I/O.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::protocol::LOG_MARKER;

/// Failures parsing a single datagram. These are best-effort inputs: the
/// listener reports and drops them without stopping.
#[derive(Error, Debug)]
pub enum LogParseError {
    #[error("datagram does not start with the log marker")]
    MissingMarker,

    #[error("log line has no parseable timestamp")]
    BadTimestamp,
}

pub type LogParseResult<T> = Result<T, LogParseError>;

/// One parsed log event
///
/// `Shutdown` is produced for the zero-length poison datagram and is the
/// terminal event: it is delivered to every subscriber exactly once, after
/// which the listener loop ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A log line with its embedded timestamp and remaining message bytes.
    /// The message is kept as raw bytes; payloads may contain non-text data.
    Message {
        timestamp: NaiveDateTime,
        message: Vec<u8>,
    },
    /// Stream termination
    Shutdown,
}

/// Parse one UDP datagram payload into a log event
pub fn parse_datagram(datagram: &[u8]) -> LogParseResult<LogEvent> {
    if datagram.is_empty() {
        return Ok(LogEvent::Shutdown);
    }
    if datagram.len() < LOG_MARKER.len() || datagram[..LOG_MARKER.len()] != LOG_MARKER {
        return Err(LogParseError::MissingMarker);
    }

    // Skip the marker and the packet-type byte. Real servers terminate each
    // line with a newline and a NUL; both are trimmed off.
    let mut text = datagram.get(LOG_MARKER.len() + 1..).unwrap_or(&[]);
    while let [rest @ .., b'\n' | b'\0'] = text {
        text = rest;
    }

    let (timestamp, message) = parse_timestamp(text)?;
    Ok(LogEvent::Message {
        timestamp,
        message: message.to_vec(),
    })
}

/// Scan the embedded `MM/DD/YYYY - HH:MM:SS: ` prefix, returning the
/// timestamp and the rest of the line.
///
/// Fields are digit runs delimited by '/', ' ' and ':'; unpadded values
/// such as `13:5:40` are accepted since servers actually emit them, and
/// non-digit qualifiers before the date (the `L ` of remote logs) are
/// skipped over.
fn parse_timestamp(buffer: &[u8]) -> LogParseResult<(NaiveDateTime, &[u8])> {
    let mut month = None;
    let mut day = None;
    let mut year = None;
    let mut hour = None;
    let mut minute = None;
    let mut second = None;

    let mut digits: Option<u32> = None;
    let mut rest_at = buffer.len();

    for (idx, &byte) in buffer.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {
                // Saturate on absurd digit runs; the out-of-range value is
                // rejected when the calendar fields are validated below.
                digits = Some(
                    digits
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(u32::from(byte - b'0')),
                );
            }
            b'/' => {
                if month.is_none() {
                    month = digits.take();
                } else if day.is_none() {
                    day = digits.take();
                }
            }
            b' ' => {
                if year.is_none() {
                    year = digits.take();
                }
            }
            b':' => {
                if hour.is_none() {
                    hour = digits.take();
                } else if minute.is_none() {
                    minute = digits.take();
                } else {
                    second = digits.take();
                    // The message starts after this colon and one space.
                    rest_at = idx + 2;
                    break;
                }
            }
            _ => {}
        }
    }

    let timestamp = match (month, day, year, hour, minute, second) {
        (Some(month), Some(day), Some(year), Some(hour), Some(minute), Some(second)) => {
            let year = i32::try_from(year).map_err(|_| LogParseError::BadTimestamp)?;
            NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(hour, minute, second))
                .ok_or(LogParseError::BadTimestamp)?
        }
        _ => return Err(LogParseError::BadTimestamp),
    };

    Ok((timestamp, buffer.get(rest_at..).unwrap_or(&[])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn parses_a_remote_log_datagram() {
        let datagram = b"\xff\xff\xff\xffR01/02/2020 - 03:04:05: Player<1><STEAM_1><>\" connected";
        let event = parse_datagram(datagram).unwrap();
        assert_eq!(
            event,
            LogEvent::Message {
                timestamp: timestamp(2020, 1, 2, 3, 4, 5),
                message: b"Player<1><STEAM_1><>\" connected".to_vec(),
            }
        );
    }

    #[test]
    fn parses_unpadded_fields_and_the_l_qualifier() {
        let datagram =
            b"\xff\xff\xff\xffRL 11/20/2016 - 13:5:40: \"Human<2><[U:0:12345678]><Unassigned>\" joined team \"CT\"\n\0";
        let event = parse_datagram(datagram).unwrap();
        assert_eq!(
            event,
            LogEvent::Message {
                timestamp: timestamp(2016, 11, 20, 13, 5, 40),
                message: b"\"Human<2><[U:0:12345678]><Unassigned>\" joined team \"CT\"".to_vec(),
            }
        );
    }

    #[test]
    fn zero_length_datagram_is_the_shutdown_event() {
        assert_eq!(parse_datagram(b"").unwrap(), LogEvent::Shutdown);
    }

    #[test]
    fn rejects_a_missing_marker() {
        assert!(matches!(
            parse_datagram(b"R01/02/2020 - 03:04:05: hello"),
            Err(LogParseError::MissingMarker)
        ));
    }

    #[test]
    fn rejects_a_truncated_datagram() {
        assert!(matches!(
            parse_datagram(b"\xff\xff"),
            Err(LogParseError::MissingMarker)
        ));
        assert!(matches!(
            parse_datagram(b"\xff\xff\xff\xff"),
            Err(LogParseError::BadTimestamp)
        ));
    }

    #[test]
    fn rejects_garbage_where_the_timestamp_should_be() {
        assert!(matches!(
            parse_datagram(b"\xff\xff\xff\xffRthis is not a timestamp"),
            Err(LogParseError::BadTimestamp)
        ));
    }

    #[test]
    fn rejects_digit_runs_wider_than_a_field() {
        // Fields that overflow their integer type must come back as a
        // parse error, not a panic or a wrapped-around timestamp.
        assert!(matches!(
            parse_datagram(b"\xff\xff\xff\xffR9999999999/9/9 9:9:9: boom"),
            Err(LogParseError::BadTimestamp)
        ));
        assert!(matches!(
            parse_datagram(b"\xff\xff\xff\xffR01/02/99999999999 - 03:04:05: hello"),
            Err(LogParseError::BadTimestamp)
        ));
    }

    #[test]
    fn rejects_an_impossible_calendar_date() {
        assert!(matches!(
            parse_datagram(b"\xff\xff\xff\xffR13/40/2020 - 03:04:05: nope"),
            Err(LogParseError::BadTimestamp)
        ));
    }

    #[test]
    fn message_is_empty_when_the_line_ends_at_the_seconds_field() {
        let event = parse_datagram(b"\xff\xff\xff\xffR01/02/2020 - 03:04:05:").unwrap();
        assert_eq!(
            event,
            LogEvent::Message {
                timestamp: timestamp(2020, 1, 2, 3, 4, 5),
                message: Vec::new(),
            }
        );
    }
}
