// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

use visitrs::domain::models::schedule::{ActiveHours, Eligibility, Schedule, FAILURE_THRESHOLD};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 14, hour, minute, 0).unwrap()
}

fn window(start: (u32, u32), end: (u32, u32)) -> ActiveHours {
    ActiveHours::new(
        NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
    )
}

/// 测试活跃窗口之外的调度不符合条件
#[test]
fn test_outside_active_hours_is_not_eligible() {
    let schedule = Schedule::new("owner", 60, Some(window((8, 0), (17, 0))), 0).unwrap();
    assert_eq!(schedule.eligibility(at(18, 0), false), Eligibility::OutsideActiveHours);
    assert_eq!(schedule.eligibility(at(17, 0), false), Eligibility::OutsideActiveHours);
    assert_eq!(schedule.eligibility(at(8, 0), false), Eligibility::Eligible);
    assert_eq!(schedule.eligibility(at(12, 30), false), Eligibility::Eligible);
}

/// 测试跨越午夜的窗口
#[test]
fn test_window_wrapping_midnight() {
    let schedule = Schedule::new("owner", 60, Some(window((22, 0), (6, 0))), 0).unwrap();
    assert_eq!(schedule.eligibility(at(23, 15), false), Eligibility::Eligible);
    assert_eq!(schedule.eligibility(at(3, 0), false), Eligibility::Eligible);
    assert_eq!(schedule.eligibility(at(12, 0), false), Eligibility::OutsideActiveHours);
}

/// 测试活跃窗口按调度的UTC偏移解释
#[test]
fn test_window_uses_schedule_offset() {
    // UTC-5: 13:00 UTC is 08:00 local
    let schedule = Schedule::new("owner", 60, Some(window((8, 0), (17, 0))), -300).unwrap();
    assert_eq!(schedule.eligibility(at(13, 0), false), Eligibility::Eligible);
    assert_eq!(schedule.eligibility(at(12, 59), false), Eligibility::OutsideActiveHours);
    assert_eq!(schedule.eligibility(at(22, 0), false), Eligibility::OutsideActiveHours);
}

/// 测试资格判定的优先顺序
#[test]
fn test_eligibility_checks() {
    let mut schedule = Schedule::new("owner", 30, None, 0).unwrap();
    let now = Utc::now() + Duration::seconds(1);
    assert_eq!(schedule.eligibility(now, true), Eligibility::OwnerBusy);

    schedule.mark_dispatched(now);
    assert_eq!(schedule.eligibility(now, false), Eligibility::NotDue);
    assert_eq!(
        schedule.eligibility(now + Duration::minutes(30), false),
        Eligibility::Eligible
    );

    schedule.disable();
    assert_eq!(
        schedule.eligibility(now + Duration::minutes(30), false),
        Eligibility::Disabled
    );
}

/// 测试错过的周期不会补跑
#[test]
fn test_missed_intervals_are_not_backfilled() {
    let mut schedule = Schedule::new("owner", 15, None, 0).unwrap();
    let late = Utc::now() + Duration::hours(6);
    schedule.mark_dispatched(late);
    assert_eq!(schedule.next_run, late + Duration::minutes(15));
    assert_eq!(schedule.last_run, Some(late.into()));
}

/// 测试连续失败达到阈值后自动禁用，成功清零计数
#[test]
fn test_failure_backoff_and_reset() {
    let mut schedule = Schedule::new("owner", 30, None, 0).unwrap();

    for _ in 0..FAILURE_THRESHOLD - 1 {
        assert!(!schedule.record_failure());
    }
    assert!(schedule.enabled);

    schedule.record_success();
    assert_eq!(schedule.consecutive_failures, 0);

    for _ in 0..FAILURE_THRESHOLD - 1 {
        assert!(!schedule.record_failure());
    }
    assert!(schedule.record_failure());
    assert!(!schedule.enabled);
    assert_eq!(schedule.consecutive_failures, FAILURE_THRESHOLD);

    // already disabled: further failures do not report a new transition
    assert!(!schedule.record_failure());

    let now = Utc::now();
    schedule.enable(now);
    assert!(schedule.enabled);
    assert_eq!(schedule.consecutive_failures, 0);
    assert_eq!(schedule.eligibility(now, false), Eligibility::Eligible);
}

/// 测试非法参数被拒绝
#[test]
fn test_invalid_schedule_parameters() {
    assert!(Schedule::new("owner", 0, None, 0).is_err());
    assert!(Schedule::new("owner", 10, None, 24 * 60).is_err());
    assert!(Schedule::new("owner", 10, None, -840).is_ok());
}

/// 测试首尾相同的活跃窗口被拒绝
#[test]
fn test_empty_active_window_is_rejected() {
    let empty = window((9, 0), (9, 0));
    assert!(empty.is_empty());
    assert!(Schedule::new("owner", 60, Some(empty), 0).is_err());

    let one_minute = window((9, 0), (9, 1));
    assert!(!one_minute.is_empty());
    let schedule = Schedule::new("owner", 60, Some(one_minute), 0).unwrap();
    assert_eq!(schedule.eligibility(at(9, 0), false), Eligibility::Eligible);
    assert_eq!(schedule.eligibility(at(9, 1), false), Eligibility::OutsideActiveHours);
}

/// 测试窗口分钟数互相转换
#[test]
fn test_active_hours_minutes_roundtrip() {
    let w = window((7, 45), (19, 15));
    let (start, end) = w.to_minutes();
    assert_eq!((start, end), (465, 1155));
    assert_eq!(ActiveHours::from_minutes(start, end), Some(w));
    assert_eq!(ActiveHours::from_minutes(-1, 10), None);
    assert_eq!(ActiveHours::from_minutes(0, 1440), None);
}
