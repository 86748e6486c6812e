//! Parser for the hddtemp daemon's text protocol.
//!
//! A response looks like `|/dev/sda|WDC WD10EZEX|35|C||/dev/sdb|ST2000|SLP|*|`:
//! records are separated by `||` and every record carries exactly four
//! `|`-separated fields: device, drive id, temperature and unit.

/// Temperature published for drives that report no usable reading (unit `*`).
pub const UNKNOWN_TEMPERATURE: f64 = -1.0;

const RECORD_SEPARATOR: &str = "||";
const FIELD_SEPARATOR: char = '|';

/// One drive entry from an hddtemp response.
#[derive(Debug, Clone, PartialEq)]
pub struct HddTempRecord {
    pub device: String,
    pub id: String,
    /// Celsius, or [`UNKNOWN_TEMPERATURE`] when the unit is `*`.
    pub temperature: f64,
    pub unit: char,
}

/// Parse failures. Only `MalformedEnvelope` rejects a whole response; the
/// other variants concern a single record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed hddtemp response {raw:?}")]
    MalformedEnvelope { raw: String },

    #[error("malformed hddtemp record {record:?}: expected 4 fields, found {fields}")]
    MalformedRecord { record: String, fields: usize },

    #[error("invalid temperature {value:?} in hddtemp record {record:?}")]
    InvalidTemperatureValue { record: String, value: String },

    #[error("unsupported temperature unit {unit:?} in hddtemp record {record:?}, only Celsius is supported")]
    UnsupportedUnit { record: String, unit: String },
}

/// Outcome of parsing one response: the well-formed records plus the
/// per-record failures, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub records: Vec<HddTempRecord>,
    pub errors: Vec<ParseError>,
}

/// Parses a complete hddtemp response.
///
/// Fails only when the envelope itself is broken (empty, or not bounded by
/// `|`). A bad record never hides its siblings.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ParseError> {
    // A report cut short before its closing `|` is rejected as a whole, not
    // parsed as a truncated final record.
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let body = trimmed
        .strip_prefix(FIELD_SEPARATOR)
        .and_then(|s| s.strip_suffix(FIELD_SEPARATOR))
        .ok_or_else(|| ParseError::MalformedEnvelope {
            raw: raw.to_string(),
        })?;

    let mut parsed = ParsedResponse::default();
    for item in body.split(RECORD_SEPARATOR) {
        match parse_record(item) {
            Ok(record) => parsed.records.push(record),
            Err(e) => parsed.errors.push(e),
        }
    }
    Ok(parsed)
}

/// Parses one record, without its surrounding separators.
pub fn parse_record(item: &str) -> Result<HddTempRecord, ParseError> {
    let fields: Vec<&str> = item.split(FIELD_SEPARATOR).collect();
    let &[device, id, temperature, unit] = fields.as_slice() else {
        return Err(ParseError::MalformedRecord {
            record: item.to_string(),
            fields: fields.len(),
        });
    };

    let temperature = match unit {
        "*" => UNKNOWN_TEMPERATURE,
        "C" => match temperature.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                return Err(ParseError::InvalidTemperatureValue {
                    record: item.to_string(),
                    value: temperature.to_string(),
                })
            }
        },
        other => {
            return Err(ParseError::UnsupportedUnit {
                record: item.to_string(),
                unit: other.to_string(),
            })
        }
    };

    Ok(HddTempRecord {
        device: device.to_string(),
        id: id.to_string(),
        temperature,
        unit: if unit == "*" { '*' } else { 'C' },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_and_unknown_records() {
        let parsed = parse_response("|/dev/sda|WDC WD10EZEX|35|C||/dev/sdb|ST2000DM001|SLP|*|").unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.records,
            vec![
                HddTempRecord {
                    device: "/dev/sda".into(),
                    id: "WDC WD10EZEX".into(),
                    temperature: 35.0,
                    unit: 'C',
                },
                HddTempRecord {
                    device: "/dev/sdb".into(),
                    id: "ST2000DM001".into(),
                    temperature: UNKNOWN_TEMPERATURE,
                    unit: '*',
                },
            ]
        );
    }

    #[test]
    fn test_fractional_temperature() {
        let record = parse_record("/dev/nvme0n1|Samsung SSD 970|41.5|C").unwrap();
        assert_eq!(record.temperature, 41.5);
    }

    #[test]
    fn test_trailing_newline_is_tolerated() {
        let parsed = parse_response("|hda|TSTCK3250631|45|C|\n").unwrap();
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_missing_trailing_pipe_is_malformed() {
        let err = parse_response("|hda|TSTCK3250631|45|C").unwrap_err();
        assert!(matches!(err, ParseError::MalformedEnvelope { .. }));
    }

    #[test]
    fn test_lone_pipe_is_malformed() {
        assert!(matches!(
            parse_response("|"),
            Err(ParseError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_three_field_record_is_malformed() {
        assert_eq!(
            parse_record("dev|id|23"),
            Err(ParseError::MalformedRecord {
                record: "dev|id|23".into(),
                fields: 3,
            })
        );
    }

    #[test]
    fn test_malformed_record_keeps_its_neighbours() {
        let parsed = parse_response("|sda|A|30|C||dev|id|23||sdb|B|31|C|").unwrap();
        let devices: Vec<&str> = parsed.records.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(devices, ["sda", "sdb"]);
        assert!(matches!(
            parsed.errors.as_slice(),
            [ParseError::MalformedRecord { fields: 3, .. }]
        ));
    }

    #[test]
    fn test_empty_device_field_is_kept() {
        let record = parse_record("|WDC|30|C").unwrap();
        assert_eq!(record.device, "");
        assert_eq!(record.id, "WDC");
    }

    #[test]
    fn test_non_numeric_celsius_value() {
        let err = parse_record("/dev/sda|WDC|ERR|C").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidTemperatureValue {
                record: "/dev/sda|WDC|ERR|C".into(),
                value: "ERR".into(),
            }
        );
    }

    #[test]
    fn test_nan_is_not_a_temperature() {
        assert!(matches!(
            parse_record("/dev/sda|WDC|NaN|C"),
            Err(ParseError::InvalidTemperatureValue { .. })
        ));
    }

    #[test]
    fn test_unknown_unit_ignores_temperature_text() {
        let record = parse_record("/dev/sdc|Virtual disk|NA|*").unwrap();
        assert_eq!(record.temperature, UNKNOWN_TEMPERATURE);
    }

    #[test]
    fn test_fahrenheit_message_names_the_unit() {
        let err = parse_record("/dev/sda|WDC|95|F").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"unsupported temperature unit "F" in hddtemp record "/dev/sda|WDC|95|F", only Celsius is supported"#
        );
    }
}
