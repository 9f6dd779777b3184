//! Step identifiers and the transition table

use crate::db::sqlite::models::SensorType;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of the configuration flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Pick the sensor category
    ChooseCategory,
    /// Optional free-text catalog search
    PriceSearch,
    /// Pick catalog items
    SelectItems,
    /// Multipliers, currency and refresh settings
    Configure,
    /// Label, frequency and address of a single-source record
    SourceConfig,
    ReconfigureSearch,
    ReconfigureSelect,
    ReconfigureConfigure,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::ChooseCategory => "choose_category",
            StepId::PriceSearch => "price_search",
            StepId::SelectItems => "select_items",
            StepId::Configure => "configure",
            StepId::SourceConfig => "source_config",
            StepId::ReconfigureSearch => "reconfigure_search",
            StepId::ReconfigureSelect => "reconfigure_select",
            StepId::ReconfigureConfigure => "reconfigure_configure",
        }
    }

    pub fn is_reconfigure(&self) -> bool {
        matches!(
            self,
            StepId::ReconfigureSearch | StepId::ReconfigureSelect | StepId::ReconfigureConfigure
        )
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum FlowState {
    Step(StepId),
    Done,
    Aborted,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done | FlowState::Aborted)
    }
}

/// Result of evaluating one step with complete input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A category was chosen
    Category(SensorType),
    /// The step's input was accepted
    Submitted,
    /// The candidate list came out empty
    NoResults,
    /// The record was written
    Finished,
    /// The flow ended without writing anything
    Aborted,
}

/// Transition table. Any pair not listed is illegal.
pub fn next(step: StepId, outcome: Outcome) -> Result<FlowState> {
    use Outcome::*;
    use StepId::*;

    let state = match (step, outcome) {
        (ChooseCategory, Category(SensorType::Price)) => FlowState::Step(PriceSearch),
        (ChooseCategory, Category(_)) => FlowState::Step(SourceConfig),

        (PriceSearch, Submitted) => FlowState::Step(SelectItems),
        (SelectItems, Submitted) => FlowState::Step(Configure),
        (SelectItems, NoResults) => FlowState::Step(PriceSearch),

        (ReconfigureSearch, Submitted) => FlowState::Step(ReconfigureSelect),
        (ReconfigureSelect, Submitted) => FlowState::Step(ReconfigureConfigure),
        (ReconfigureSelect, NoResults) => FlowState::Step(ReconfigureSearch),

        (Configure | ReconfigureConfigure | SourceConfig, Finished) => FlowState::Done,
        (Configure | ReconfigureConfigure | SourceConfig, Aborted) => FlowState::Aborted,

        (step, outcome) => {
            return Err(AppError::Internal(format!(
                "Illegal transition from {} on {:?}",
                step, outcome
            )))
        }
    };

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_routing() {
        assert_eq!(
            next(StepId::ChooseCategory, Outcome::Category(SensorType::Price)).unwrap(),
            FlowState::Step(StepId::PriceSearch)
        );
        for sensor_type in [SensorType::BtcNetwork, SensorType::BtcMempool, SensorType::CkpoolMining] {
            assert_eq!(
                next(StepId::ChooseCategory, Outcome::Category(sensor_type)).unwrap(),
                FlowState::Step(StepId::SourceConfig)
            );
        }
    }

    #[test]
    fn test_no_results_routes_back() {
        assert_eq!(
            next(StepId::SelectItems, Outcome::NoResults).unwrap(),
            FlowState::Step(StepId::PriceSearch)
        );
        assert_eq!(
            next(StepId::ReconfigureSelect, Outcome::NoResults).unwrap(),
            FlowState::Step(StepId::ReconfigureSearch)
        );
    }

    #[test]
    fn test_terminal_transitions() {
        assert_eq!(next(StepId::Configure, Outcome::Finished).unwrap(), FlowState::Done);
        assert_eq!(next(StepId::SourceConfig, Outcome::Aborted).unwrap(), FlowState::Aborted);
        assert!(FlowState::Done.is_terminal());
        assert!(!FlowState::Step(StepId::Configure).is_terminal());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(next(StepId::PriceSearch, Outcome::Finished).is_err());
        assert!(next(StepId::ChooseCategory, Outcome::Submitted).is_err());
        assert!(next(StepId::Configure, Outcome::NoResults).is_err());
        assert!(next(StepId::ReconfigureSearch, Outcome::Category(SensorType::Price)).is_err());
    }
}
