use crate::core::model::StrategyClass;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a class is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    LossStreak,
    DailyStop,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::LossStreak => f.write_str("loss streak"),
            PauseReason::DailyStop => f.write_str("daily stop"),
        }
    }
}

/// Trading permission of a class as seen at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Active,
    /// Loss streak at or over the limit, no pause in force. Half size.
    Cooling,
    Paused { until: DateTime<Utc> },
}

impl RiskStatus {
    pub fn is_paused(&self) -> bool {
        matches!(self, RiskStatus::Paused { .. })
    }

    pub fn is_penalized(&self) -> bool {
        !matches!(self, RiskStatus::Active)
    }
}

/// Cross-cycle risk state of one strategy class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub class: StrategyClass,
    pub nav_total: Decimal,
    pub nav_a: Decimal,
    pub nav_b: Decimal,
    /// Class NAV at creation or at the last daily reset
    pub day_start_nav: Decimal,
    pub loss_streak: u32,
    pub paused_until: Option<DateTime<Utc>>,
    pub pause_reason: Option<PauseReason>,
    pub last_reset: DateTime<Utc>,
}

impl RiskState {
    pub fn new(class: StrategyClass, now: DateTime<Utc>) -> Self {
        Self {
            class,
            nav_total: Decimal::ZERO,
            nav_a: Decimal::ZERO,
            nav_b: Decimal::ZERO,
            day_start_nav: Decimal::ZERO,
            loss_streak: 0,
            paused_until: None,
            pause_reason: None,
            last_reset: now,
        }
    }

    /// NAV allotted to this state's own class
    pub fn class_nav(&self) -> Decimal {
        match self.class {
            StrategyClass::Spot => self.nav_a,
            StrategyClass::Futures => self.nav_b,
        }
    }

    /// Starts or extends a pause. A window that ended by `now` is dropped
    /// first, so its reason does not carry over.
    pub fn pause(&mut self, now: DateTime<Utc>, until: DateTime<Utc>, reason: PauseReason) {
        if self.paused_until.map_or(false, |current| current <= now) {
            self.clear_pause();
        }
        // A daily stop outranks a streak pause so wins can not lift it
        let reason = match (self.pause_reason, reason) {
            (Some(PauseReason::DailyStop), _) if self.paused_until.is_some() => PauseReason::DailyStop,
            (_, reason) => reason,
        };
        self.paused_until = Some(match self.paused_until {
            Some(current) if current > until => current,
            _ => until,
        });
        self.pause_reason = Some(reason);
    }

    pub fn clear_pause(&mut self) {
        self.paused_until = None;
        self.pause_reason = None;
    }

    /// Status at `now`, dropping a pause whose window has passed
    pub fn refresh(&mut self, now: DateTime<Utc>, loss_streak_limit: u32) -> RiskStatus {
        if let Some(until) = self.paused_until {
            if now < until {
                return RiskStatus::Paused { until };
            }
            self.clear_pause();
        }
        if self.loss_streak >= loss_streak_limit {
            RiskStatus::Cooling
        } else {
            RiskStatus::Active
        }
    }
}
