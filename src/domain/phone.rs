use crate::utils::error::{Result, TracerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// E.164 上限為 15 位數字
pub const MAX_DIGITS: usize = 15;
pub const MIN_DIGITS: usize = 8;

const TWO_DIGIT_CODES: &[u16] = &[
    20, 27, 30, 31, 32, 33, 34, 36, 39, 40, 41, 43, 44, 45, 46, 47, 48, 49, 51, 52, 53, 54, 55,
    56, 57, 58, 60, 61, 62, 63, 64, 65, 66, 81, 82, 84, 86, 90, 91, 92, 93, 94, 95, 98,
];

const REGION_HINTS: &[(u16, &str)] = &[
    (1, "US"),
    (7, "RU"),
    (20, "EG"),
    (27, "ZA"),
    (30, "GR"),
    (31, "NL"),
    (32, "BE"),
    (33, "FR"),
    (34, "ES"),
    (36, "HU"),
    (39, "IT"),
    (40, "RO"),
    (41, "CH"),
    (43, "AT"),
    (44, "GB"),
    (45, "DK"),
    (46, "SE"),
    (47, "NO"),
    (48, "PL"),
    (49, "DE"),
    (52, "MX"),
    (54, "AR"),
    (55, "BR"),
    (61, "AU"),
    (62, "ID"),
    (63, "PH"),
    (64, "NZ"),
    (65, "SG"),
    (81, "JP"),
    (82, "KR"),
    (84, "VN"),
    (86, "CN"),
    (90, "TR"),
    (91, "IN"),
    (92, "PK"),
    (234, "NG"),
    (353, "IE"),
    (852, "HK"),
    (886, "TW"),
    (971, "AE"),
];

/// 已驗證並正規化的電話號碼。
///
/// 只能透過 [`PhoneNumber::parse`] 建立；比較與雜湊只看國碼與國內號碼，
/// 原始輸入字串不參與，因此 `parse(format(parse(x))) == parse(x)`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "PhoneNumberRecord", try_from = "PhoneNumberRecord")]
pub struct PhoneNumber {
    country_code: u16,
    national_number: String,
    raw: String,
}

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| TracerError::InvalidFormat {
            input: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let body = if let Some(rest) = trimmed.strip_prefix('+') {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("00") {
            rest
        } else {
            return Err(invalid("missing country code (expected leading '+' or '00')"));
        };

        let digits: String = body
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '/' | '\t'))
            .collect();

        if digits.is_empty() {
            return Err(invalid("no digits after country code marker"));
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("contains non-digit characters"));
        }
        if digits.starts_with('0') {
            return Err(invalid("country code cannot start with 0"));
        }
        if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
            return Err(invalid(&format!(
                "length {} outside E.164 bounds ({}-{} digits)",
                digits.len(),
                MIN_DIGITS,
                MAX_DIGITS
            )));
        }

        let cc_len = country_code_length(&digits);
        let (cc, national) = digits.split_at(cc_len);
        let country_code = cc
            .parse::<u16>()
            .map_err(|_| invalid("unparsable country code"))?;

        Ok(Self {
            country_code,
            national_number: national.to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    pub fn national_number(&self) -> &str {
        &self.national_number
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// E.164 格式，例如 `+14155552671`
    pub fn format(&self) -> String {
        format!("+{}{}", self.country_code, self.national_number)
    }

    /// 只有數字的 E.164，適合當檔名
    pub fn digits(&self) -> String {
        format!("{}{}", self.country_code, self.national_number)
    }

    pub fn region_hint(&self) -> Option<&'static str> {
        REGION_HINTS
            .iter()
            .find(|(code, _)| *code == self.country_code)
            .map(|(_, region)| *region)
    }
}

fn country_code_length(digits: &str) -> usize {
    if digits.starts_with('1') || digits.starts_with('7') {
        return 1;
    }
    let two = digits[..2].parse::<u16>().unwrap_or_default();
    if TWO_DIGIT_CODES.contains(&two) {
        2
    } else {
        3
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.country_code == other.country_code && self.national_number == other.national_number
    }
}

impl Eq for PhoneNumber {}

impl Hash for PhoneNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.country_code.hash(state);
        self.national_number.hash(state);
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhoneNumberRecord {
    e164: String,
    country_code: u16,
    national_number: String,
    raw: String,
}

impl From<PhoneNumber> for PhoneNumberRecord {
    fn from(number: PhoneNumber) -> Self {
        Self {
            e164: number.format(),
            country_code: number.country_code,
            national_number: number.national_number,
            raw: number.raw,
        }
    }
}

impl TryFrom<PhoneNumberRecord> for PhoneNumber {
    type Error = TracerError;

    fn try_from(record: PhoneNumberRecord) -> Result<Self> {
        let mut number = PhoneNumber::parse(&record.e164)?;
        number.raw = record.raw;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_us_number() {
        let number = PhoneNumber::parse("+1 (415) 555-2671").unwrap();
        assert_eq!(number.country_code(), 1);
        assert_eq!(number.national_number(), "4155552671");
        assert_eq!(number.format(), "+14155552671");
        assert_eq!(number.raw(), "+1 (415) 555-2671");
        assert_eq!(number.region_hint(), Some("US"));
    }

    #[test]
    fn test_parse_country_code_lengths() {
        assert_eq!(PhoneNumber::parse("+44 20 7946 0958").unwrap().country_code(), 44);
        assert_eq!(PhoneNumber::parse("+886 912 345 678").unwrap().country_code(), 886);
        assert_eq!(PhoneNumber::parse("0049 30 123456").unwrap().country_code(), 49);
        assert_eq!(PhoneNumber::parse("+7 912 345 67 89").unwrap().country_code(), 7);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let inputs = [
            "+14155552671",
            "+1-415-555-2671",
            "0044 20 7946 0958",
            "+886.912.345.678",
            "+353 (1) 234 5678",
        ];
        for input in inputs {
            let first = PhoneNumber::parse(input).unwrap();
            let second = PhoneNumber::parse(&first.format()).unwrap();
            assert_eq!(first, second, "input {}", input);
            assert_eq!(first.format(), second.format());
        }
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        let inputs = [
            "abc",
            "123",
            "4155552671",
            "+",
            "+1 415 CALL NOW",
            "+0123456789",
            "+1234567",
            "+1234567890123456",
            "",
        ];
        for input in inputs {
            let err = PhoneNumber::parse(input).unwrap_err();
            assert!(
                matches!(err, TracerError::InvalidFormat { .. }),
                "input {:?} gave {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_serde_revalidates() {
        let number = PhoneNumber::parse("+44 20 7946 0958").unwrap();
        let json = serde_json::to_value(&number).unwrap();
        assert_eq!(json["e164"], "+442079460958");
        assert_eq!(json["raw"], "+44 20 7946 0958");

        let back: PhoneNumber = serde_json::from_value(json).unwrap();
        assert_eq!(back, number);
        assert_eq!(back.raw(), number.raw());

        let bogus = serde_json::json!({
            "e164": "12",
            "country_code": 1,
            "national_number": "2",
            "raw": "12"
        });
        assert!(serde_json::from_value::<PhoneNumber>(bogus).is_err());
    }
}
