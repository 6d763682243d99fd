use chrono::{Datelike, NaiveDate};

/// Patients at or above this age are always seen with priority.
pub const PRIORITY_AGE: i32 = 60;

/// Age in whole years on `today`; the year only counts once the birthday has passed.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// Explicit clinical flag, or age at or above [`PRIORITY_AGE`] on `today`.
pub fn is_priority(birth_date: Option<NaiveDate>, explicit: bool, today: NaiveDate) -> bool {
    explicit
        || birth_date
            .map(|birth| age_on(birth, today) >= PRIORITY_AGE)
            .unwrap_or(false)
}
