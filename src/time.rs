use chrono::{DateTime, Datelike, Local, Timelike};

// time = hour<<11 | minute<<5 | (second/2)
// date = (year-1980)<<9 | month<<5 | day
pub fn pack_now() -> (u16, u16) {
    pack(Local::now())
}

fn pack(now: DateTime<Local>) -> (u16, u16) {
    let time = ((now.hour() as u16) << 11)
        | ((now.minute() as u16) << 5)
        | ((now.second() as u16) / 2);
    let year = (now.year().max(1980) - 1980) as u16;
    let date = (year << 9) | ((now.month() as u16) << 5) | (now.day() as u16);
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn packs_known_timestamp() {
        let dt = Local.with_ymd_and_hms(2026, 7, 28, 13, 45, 30).unwrap();
        let (time, date) = pack(dt);
        assert_eq!(time, (13 << 11) | (45 << 5) | (30 / 2));
        assert_eq!(date, ((2026u16 - 1980) << 9) | (7 << 5) | 28);
    }
}
