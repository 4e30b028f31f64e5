use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

// "A (남,96졸)", "H (여,91생)", "D (남,  )", "Dr. A (male,96grad)"
static PROFILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\((?P<gender>남|여|(?i:female|male))?\s*,?\s*(?P<yy>\d{2})?\s*(?P<tag>졸|생|(?i:grad|birth|born))?\)",
    )
    .unwrap()
});
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<sy>\d{2})\.(?P<sm>\d{1,2})\s*~\s*(?P<ey>\d{2})\.(?P<em>\d{1,2})\b").unwrap()
});

/// Two-digit years up to this value are read as 20xx, the rest as 19xx.
const CENTURY_PIVOT: u32 = 29;
/// Availability windows end on this day of the closing month. Not the real
/// month end: 28 is valid for every month.
const AVAILABILITY_END_DAY: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub gender: Option<Gender>,
    pub graduation_year: Option<i32>,
    pub birth_year: Option<i32>,
}

pub fn expand_year(yy: u32) -> i32 {
    let century = if yy <= CENTURY_PIVOT { 2000 } else { 1900 };
    century + yy as i32
}

/// Gender and graduation/birth year from the parenthesized tag of a name cell.
pub fn parse_profile(name: &str) -> Profile {
    let Some(caps) = PROFILE_RE.captures(name) else {
        return Profile::default();
    };

    let gender = caps.name("gender").and_then(|m| match m.as_str().to_lowercase().as_str() {
        "남" | "male" => Some(Gender::Male),
        "여" | "female" => Some(Gender::Female),
        _ => None,
    });

    let mut profile = Profile {
        gender,
        ..Profile::default()
    };
    let year = caps
        .name("yy")
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(expand_year);
    if let (Some(year), Some(tag)) = (year, caps.name("tag")) {
        match tag.as_str().to_lowercase().as_str() {
            "졸" | "grad" => profile.graduation_year = Some(year),
            "생" | "birth" | "born" => profile.birth_year = Some(year),
            _ => {}
        }
    }
    profile
}

/// First "YY.M~YY.M" window in `text`, as (first day, approximate last day).
pub fn parse_availability(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let Some(caps) = RANGE_RE.captures(text) else {
        return (None, None);
    };
    let date = |y: &str, m: &str, day: u32| -> Option<NaiveDate> {
        let year = expand_year(y.parse().ok()?);
        NaiveDate::from_ymd_opt(year, m.parse().ok()?, day)
    };
    (
        date(&caps["sy"], &caps["sm"], 1),
        date(&caps["ey"], &caps["em"], AVAILABILITY_END_DAY),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn graduation_tag() {
        let p = parse_profile("A (남,96졸)");
        assert_eq!(p.gender, Some(Gender::Male));
        assert_eq!(p.graduation_year, Some(1996));
        assert_eq!(p.birth_year, None);
    }

    #[test]
    fn birth_tag() {
        let p = parse_profile("H (여,05생)");
        assert_eq!(p.gender, Some(Gender::Female));
        assert_eq!(p.birth_year, Some(2005));
        assert_eq!(p.graduation_year, None);
    }

    #[test]
    fn english_tags() {
        let p = parse_profile("Dr. A (male,96grad)");
        assert_eq!(p.gender, Some(Gender::Male));
        assert_eq!(p.graduation_year, Some(1996));

        let p = parse_profile("Dr. B (Female, 88 birth)");
        assert_eq!(p.gender, Some(Gender::Female));
        assert_eq!(p.birth_year, Some(1988));
    }

    #[test]
    fn century_pivot() {
        assert_eq!(parse_profile("X (29졸)").graduation_year, Some(2029));
        assert_eq!(parse_profile("X (30졸)").graduation_year, Some(1930));
        assert_eq!(parse_profile("X (00생)").birth_year, Some(2000));
        assert_eq!(parse_profile("X (99생)").birth_year, Some(1999));
    }

    #[test]
    fn partial_tags() {
        let p = parse_profile("D (남,  )");
        assert_eq!(p.gender, Some(Gender::Male));
        assert_eq!(p.graduation_year, None);

        // a year without a tag says nothing about which year it is
        let p = parse_profile("E (여,91)");
        assert_eq!(p, Profile { gender: Some(Gender::Female), ..Profile::default() });
    }

    #[test]
    fn no_tag() {
        assert_eq!(parse_profile("김철수"), Profile::default());
        assert_eq!(parse_profile("김철수 (외래 전용)"), Profile::default());
    }

    #[test]
    fn availability_window() {
        let (start, end) = parse_availability("F (남,02졸)\n25.8~25.12");
        assert_eq!(start, ymd(2025, 8, 1));
        assert_eq!(end, ymd(2025, 12, 28));

        let (start, end) = parse_availability("G 24.3 ~ 25.2 파견");
        assert_eq!(start, ymd(2024, 3, 1));
        assert_eq!(end, ymd(2025, 2, 28));
    }

    #[test]
    fn availability_rejects_bad_months() {
        assert_eq!(parse_availability("25.13~26.1"), (None, ymd(2026, 1, 28)));
        assert_eq!(parse_availability("no window"), (None, None));
    }
}
