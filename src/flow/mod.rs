//! Configuration flow
//!
//! A [`ConfigFlow`] walks a user through creating a record, or through
//! reconfiguring the item selection of an existing catalog record. Each call to
//! [`ConfigFlow::handle`] evaluates the current step with the submitted input
//! and either hands back a form for the next step or finishes the flow.
//!
//! Nothing is written until the final step accepts its input. Dropping a flow
//! at any earlier point leaves storage untouched.

pub mod form;
pub mod merge;
pub mod reconcile;
pub mod session;
pub mod steps;
pub mod validation;

use crate::catalog::{CatalogItem, CatalogService, SEARCH_LIMIT};
use crate::config::SharedSettings;
use crate::db::sqlite::models::{join_list, ConfigEntry, MiningConfig, PriceConfig, RecordData, SensorType};
use crate::error::{AppError, Result};
use crate::host::{EntityRegistry, RecordListener, RecordStore};
use form::*;
use serde_json::Value;
use session::{top_items, WizardSession};
use std::sync::Arc;
use steps::{FlowState, Outcome, StepId};
use tracing::{debug, error, info, warn};

/// Collaborators a flow works against
#[derive(Clone)]
pub struct FlowContext {
    pub catalog: Arc<dyn CatalogService>,
    pub store: Arc<dyn RecordStore>,
    pub registry: Arc<dyn EntityRegistry>,
    pub settings: SharedSettings,
    /// Notified after a record is written
    pub listeners: Vec<Arc<dyn RecordListener>>,
}

/// What evaluating one step produced
enum StepAction {
    /// Wait for input on the current step
    Show(StepForm),
    /// Move on and show the next step, optionally with a notice
    Transition {
        outcome: Outcome,
        notice: Option<StepError>,
    },
    /// End the flow
    Finish { outcome: Outcome, result: FlowResult },
}

/// One running configuration flow
pub struct ConfigFlow {
    ctx: FlowContext,
    session: WizardSession,
    state: FlowState,
}

impl ConfigFlow {
    /// Flow that creates a new record
    pub fn new(ctx: FlowContext) -> Self {
        Self {
            ctx,
            session: WizardSession::new(),
            state: FlowState::Step(StepId::ChooseCategory),
        }
    }

    /// Flow that changes the item selection of an existing catalog record
    pub fn reconfigure(ctx: FlowContext, entry_id: &str) -> Result<Self> {
        let entry = ctx
            .store
            .get_record(entry_id)?
            .ok_or_else(|| AppError::NotFound(format!("Config entry not found: {}", entry_id)))?;

        if !entry.data.sensor_type().is_catalog() {
            return Err(AppError::Validation(format!(
                "Only {} records can be reconfigured",
                SensorType::Price.display_name()
            )));
        }

        info!("Reconfiguring entry {} ({})", entry.entry_id, entry.title);

        Ok(Self {
            ctx,
            session: WizardSession::for_reconfigure(entry),
            state: FlowState::Step(StepId::ReconfigureSearch),
        })
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    /// Evaluate the current step.
    ///
    /// `None` asks for the current step's form. Input that does not belong to
    /// the current step is rejected with a validation error and leaves the flow
    /// where it was.
    pub async fn handle(&mut self, input: Option<StepInput>) -> Result<FlowResult> {
        let mut input = input;
        let mut notice = None;

        loop {
            let step = match self.state {
                FlowState::Step(step) => step,
                finished => {
                    return Err(AppError::Validation(format!(
                        "Flow already finished: {:?}",
                        finished
                    )))
                }
            };

            match self.run_step(step, input.take(), notice.take()).await? {
                StepAction::Show(form) => return Ok(FlowResult::Form(form)),
                StepAction::Transition {
                    outcome,
                    notice: carried,
                } => {
                    let next = steps::next(step, outcome)?;
                    debug!("Flow step {} -> {:?}", step, next);
                    self.state = next;
                    notice = carried;
                }
                StepAction::Finish { outcome, result } => {
                    self.state = steps::next(step, outcome)?;
                    debug!("Flow finished at {} as {:?}", step, self.state);
                    return Ok(result);
                }
            }
        }
    }

    async fn run_step(
        &mut self,
        step: StepId,
        input: Option<StepInput>,
        notice: Option<StepError>,
    ) -> Result<StepAction> {
        match step {
            StepId::ChooseCategory => self.step_choose_category(input),
            StepId::PriceSearch | StepId::ReconfigureSearch => self.step_search(step, input, notice).await,
            StepId::SelectItems | StepId::ReconfigureSelect => self.step_select(step, input).await,
            StepId::Configure | StepId::ReconfigureConfigure => self.step_configure(step, input),
            StepId::SourceConfig => self.step_source(input),
        }
    }

    // ========== Category ==========

    fn step_choose_category(&mut self, input: Option<StepInput>) -> Result<StepAction> {
        match input {
            None => {
                let current = self.session.sensor_type.unwrap_or(SensorType::Price);
                let mut form = StepForm::new(StepId::ChooseCategory)
                    .field(FormField::required(FIELD_SENSOR_TYPE).with_default(current.as_str()));
                form.options = SensorType::ALL
                    .iter()
                    .map(|t| SelectOption {
                        value: t.as_str().to_string(),
                        label: t.display_name().to_string(),
                    })
                    .collect();
                Ok(StepAction::Show(form))
            }
            Some(StepInput::Category { sensor_type }) => {
                self.session.sensor_type = Some(sensor_type);
                Ok(StepAction::Transition {
                    outcome: Outcome::Category(sensor_type),
                    notice: None,
                })
            }
            Some(other) => Err(unexpected_input(StepId::ChooseCategory, &other)),
        }
    }

    // ========== Search ==========

    async fn step_search(
        &mut self,
        step: StepId,
        input: Option<StepInput>,
        notice: Option<StepError>,
    ) -> Result<StepAction> {
        let catalog = self.ctx.catalog.clone();
        let snapshot = self.session.snapshot(catalog.as_ref()).await;

        match input {
            None => {
                let mut form = StepForm::new(step)
                    .field(
                        FormField::optional(FIELD_SEARCH_QUERY)
                            .with_default(self.session.search_query.clone()),
                    )
                    .placeholder("catalog_size", snapshot.len());
                if let Some(notice) = notice {
                    form = form.error(FIELD_BASE, notice);
                }
                if let Some(existing) = self.session.existing_price() {
                    form = form.placeholder("current_ids", &existing.cryptocurrency_ids);
                }
                Ok(StepAction::Show(form))
            }
            Some(StepInput::Search { search_query }) => {
                self.session.search_query = search_query.trim().to_string();
                debug!("Catalog search query: '{}'", self.session.search_query);
                Ok(StepAction::Transition {
                    outcome: Outcome::Submitted,
                    notice: None,
                })
            }
            Some(other) => Err(unexpected_input(step, &other)),
        }
    }

    // ========== Select ==========

    /// Candidates for the select step: search matches or the top list, plus
    /// the record's current items when reconfiguring
    async fn candidates(&mut self, step: StepId) -> Vec<CatalogItem> {
        let catalog = self.ctx.catalog.clone();
        let snapshot = self.session.snapshot(catalog.as_ref()).await;

        let primary = if self.session.search_query.is_empty() {
            top_items(catalog.as_ref()).await
        } else {
            merge::search_snapshot(&snapshot, &self.session.search_query, SEARCH_LIMIT)
        };

        let must_include = if step.is_reconfigure() {
            self.session.existing_ids()
        } else {
            Vec::new()
        };

        merge::merge(primary, &must_include, &snapshot)
    }

    async fn show_select(
        &mut self,
        step: StepId,
        defaults: Option<Vec<String>>,
        error: Option<(StepError, Option<String>)>,
    ) -> StepAction {
        let candidates = self.candidates(step).await;
        if candidates.is_empty() {
            debug!("No candidates for query '{}'", self.session.search_query);
            return StepAction::Transition {
                outcome: Outcome::NoResults,
                notice: Some(StepError::NoResults),
            };
        }

        let defaults = defaults.unwrap_or_else(|| {
            let preselect = if step.is_reconfigure() {
                self.session.existing_ids()
            } else {
                self.session.selection.clone()
            };
            preselect
                .into_iter()
                .filter(|id| candidates.iter().any(|item| &item.id == id))
                .collect()
        });

        let mut form = StepForm::new(step)
            .field(FormField::required(FIELD_SELECTED).with_default(defaults))
            .placeholder("search_query", &self.session.search_query)
            .placeholder("candidate_count", candidates.len());
        form.options = candidates
            .iter()
            .map(|item| SelectOption {
                value: item.id.clone(),
                label: item.label(),
            })
            .collect();

        if let Some((error, invalid)) = error {
            form = form.error(FIELD_BASE, error);
            if let Some(invalid) = invalid {
                form = form.placeholder("invalid_ids", invalid);
            }
        }

        StepAction::Show(form)
    }

    async fn step_select(&mut self, step: StepId, input: Option<StepInput>) -> Result<StepAction> {
        let selected_cryptos = match input {
            None => return Ok(self.show_select(step, None, None).await),
            Some(StepInput::Select { selected_cryptos }) => selected_cryptos,
            Some(other) => return Err(unexpected_input(step, &other)),
        };

        let selected = validation::normalize_selection(&selected_cryptos);
        if !validation::check_non_empty(&selected) {
            return Ok(self
                .show_select(step, Some(Vec::new()), Some((StepError::NoCryptoSelected, None)))
                .await);
        }

        let catalog = self.ctx.catalog.clone();
        let snapshot = self.session.snapshot(catalog.as_ref()).await;
        let results = if snapshot.is_empty() {
            validation::check_catalog_validity(&selected, catalog.as_ref()).await
        } else {
            validation::check_snapshot_validity(&selected, &snapshot)
        };
        let invalid = validation::invalid_ids(&selected, &results);
        if !invalid.is_empty() {
            warn!("Invalid cryptocurrency ids selected: {:?}", invalid);
            return Ok(self
                .show_select(
                    step,
                    Some(selected),
                    Some((StepError::InvalidCryptocurrencyIds, Some(invalid.join(", ")))),
                )
                .await);
        }

        debug!("Selected items: {:?}", selected);
        self.session.selection = selected;
        self.session.last_configure = None;
        Ok(StepAction::Transition {
            outcome: Outcome::Submitted,
            notice: None,
        })
    }

    // ========== Configure ==========

    fn configure_form(&self, step: StepId) -> StepForm {
        let selection = &self.session.selection;
        let min_time = self.ctx.settings.read().min_time_between_requests;

        let mut label = FormField::optional(FIELD_LABEL);
        let mut multipliers = FormField::required(FIELD_MULTIPLIERS);
        let mut currency = FormField::required(FIELD_CURRENCY);
        let mut unit = FormField::optional(FIELD_UNIT);
        let mut frequency = FormField::required(FIELD_UPDATE_FREQUENCY);
        let mut min_time_field = FormField::required(FIELD_MIN_TIME);

        if let Some(previous) = &self.session.last_configure {
            if let Some(value) = &previous.label {
                label = label.with_default(value.clone());
            }
            multipliers = multipliers.with_default(previous.multipliers.clone());
            currency = currency.with_default(previous.currency_name.clone());
            if let Some(value) = &previous.unit_of_measurement {
                unit = unit.with_default(value.clone());
            }
            frequency = frequency.with_default(previous.update_frequency);
            min_time_field = min_time_field.with_default(previous.min_time_between_requests);
        } else if let Some(existing) = self.session.existing_price().filter(|_| step.is_reconfigure()) {
            label = label.with_default(existing.label.clone());
            multipliers = multipliers.with_default(carried_multipliers(existing, selection));
            currency = currency.with_default(existing.currency_name.clone());
            unit = unit.with_default(existing.unit_of_measurement.clone());
            frequency = frequency.with_default(existing.update_frequency);
            min_time_field = min_time_field.with_default(min_time);
        } else {
            label = label.with_suggested("My Wallet");
            multipliers = multipliers.with_default(vec!["1"; selection.len()].join(", "));
            currency = currency.with_default("usd");
            unit = unit.with_suggested("$");
            frequency = frequency.with_default(5);
            min_time_field = min_time_field.with_default(min_time);
        }

        StepForm::new(step)
            .field(label)
            .field(multipliers)
            .field(currency)
            .field(unit)
            .field(frequency)
            .field(min_time_field)
            .placeholder("selected_cryptos", join_list(selection))
    }

    fn step_configure(&mut self, step: StepId, input: Option<StepInput>) -> Result<StepAction> {
        let submitted = match input {
            None => return Ok(StepAction::Show(self.configure_form(step))),
            Some(StepInput::Configure(submitted)) => submitted,
            Some(other) => return Err(unexpected_input(step, &other)),
        };

        let multipliers = validation::parse_multipliers(&submitted.multipliers);
        let crypto_count = self.session.selection.len();
        self.session.last_configure = Some(submitted.clone());

        if !validation::check_count_parity(&self.session.selection, &multipliers) {
            debug!(
                "Multiplier count {} does not match {} selected items",
                multipliers.len(),
                crypto_count
            );
            let form = self
                .configure_form(step)
                .error(FIELD_BASE, StepError::MismatchValues)
                .placeholder("crypto_count", crypto_count)
                .placeholder("multiplier_count", multipliers.len());
            return Ok(StepAction::Show(form));
        }

        let mut form = self.configure_form(step);
        let mut rejected = false;
        for (field, value) in [
            (FIELD_UPDATE_FREQUENCY, submitted.update_frequency),
            (FIELD_MIN_TIME, submitted.min_time_between_requests),
        ] {
            if let Some(error) = validation::check_interval(value) {
                form = form.error(field, error);
                rejected = true;
            }
        }
        if rejected {
            return Ok(StepAction::Show(form));
        }

        if step.is_reconfigure() {
            self.finish_reconfigure(submitted, &multipliers)
        } else {
            let config = PriceConfig {
                label: trimmed(submitted.label.as_deref()),
                cryptocurrency_ids: join_list(&self.session.selection),
                multipliers: join_list(&multipliers),
                currency_name: non_blank_or(&submitted.currency_name, "usd"),
                unit_of_measurement: trimmed(submitted.unit_of_measurement.as_deref()),
                update_frequency: submitted.update_frequency,
                min_time_between_requests: submitted.min_time_between_requests,
            };
            self.finish_create(RecordData::Price(config), Some(submitted.min_time_between_requests))
        }
    }

    fn finish_reconfigure(&mut self, submitted: ConfigureInput, multipliers: &[String]) -> Result<StepAction> {
        let entry = self
            .session
            .existing
            .clone()
            .ok_or_else(|| AppError::Internal("Reconfigure flow without a record".to_string()))?;
        let previous = match &entry.data {
            RecordData::Price(config) => config.clone(),
            RecordData::Mining(_) => {
                return Err(AppError::Internal(format!(
                    "Entry {} is not a catalog record",
                    entry.entry_id
                )))
            }
        };

        let config = PriceConfig {
            label: keep_unless_blank(submitted.label.as_deref(), &previous.label),
            cryptocurrency_ids: join_list(&self.session.selection),
            multipliers: join_list(multipliers),
            currency_name: keep_unless_blank(Some(submitted.currency_name.as_str()), &previous.currency_name),
            unit_of_measurement: keep_unless_blank(
                submitted.unit_of_measurement.as_deref(),
                &previous.unit_of_measurement,
            ),
            update_frequency: submitted.update_frequency,
            min_time_between_requests: submitted.min_time_between_requests,
        };
        let data = RecordData::Price(config.clone());

        if let Some(action) = self.reject_duplicate(&data, Some(&entry.entry_id)) {
            return Ok(action);
        }

        let updated = match self.ctx.store.update_record(&entry.entry_id, &data) {
            Ok(updated) => updated,
            Err(e) if e.is_constraint_violation() => return Ok(duplicate_key(&data)),
            Err(e) => {
                error!("Error updating entry {}: {}", entry.entry_id, e);
                return Ok(upstream_failure(format!("Error updating entry: {}", e)));
            }
        };

        let mut warnings = Vec::new();
        if let Some(warning) = self.apply_settings(submitted.min_time_between_requests) {
            warnings.push(warning);
        }

        let report = reconcile::reconcile(self.ctx.registry.as_ref(), &entry.entry_id, &previous, &config);
        if report.is_partial_failure() {
            warn!(
                "{} of {} entity removals failed for entry {}",
                report.failed.len(),
                report.attempted(),
                entry.entry_id
            );
            for failure in &report.failed {
                warnings.push(format!("Failed to remove {}: {}", failure.key, failure.error));
            }
        }

        let reloaded = match self.ctx.store.reload(&entry.entry_id) {
            Ok(reloaded) => reloaded,
            Err(e) => {
                warn!("Error reloading entry {}: {}", entry.entry_id, e);
                warnings.push(format!("Error reloading entry: {}", e));
                updated
            }
        };
        warnings.extend(self.notify(&reloaded));

        info!(
            "Reconfigured entry {}: {} items, {} entities removed",
            reloaded.entry_id,
            self.session.selection.len(),
            report.removed.len()
        );

        Ok(StepAction::Finish {
            outcome: Outcome::Finished,
            result: FlowResult::UpdateEntry {
                entry_id: reloaded.entry_id,
                title: reloaded.title,
                reconcile: report,
                warnings,
            },
        })
    }

    // ========== Single-source ==========

    fn source_form(&self, sensor_type: SensorType) -> StepForm {
        let previous = self.session.last_source.as_ref();

        let mut label = FormField::optional(FIELD_LABEL);
        label = match previous.and_then(|p| p.label.clone()) {
            Some(value) => label.with_default(value),
            None if sensor_type == SensorType::CkpoolMining => label.with_suggested("My Mining"),
            None => label.with_suggested("BTC"),
        };

        let frequency = FormField::required(FIELD_UPDATE_FREQUENCY)
            .with_default(previous.map(|p| p.update_frequency).unwrap_or(5.0));

        let mut form = StepForm::new(StepId::SourceConfig)
            .field(label)
            .field(frequency)
            .placeholder("sensor_type", sensor_type.display_name());

        if sensor_type.requires_address() {
            let mut address = FormField::required(FIELD_BTC_ADDRESS);
            if let Some(value) = previous.and_then(|p| p.btc_address.clone()) {
                address = address.with_default(value);
            }
            form = form.field(address);
        }

        form
    }

    fn step_source(&mut self, input: Option<StepInput>) -> Result<StepAction> {
        let sensor_type = self
            .session
            .sensor_type
            .ok_or_else(|| AppError::Internal("Source step without a category".to_string()))?;

        let submitted = match input {
            None => return Ok(StepAction::Show(self.source_form(sensor_type))),
            Some(StepInput::Source(submitted)) => submitted,
            Some(other) => return Err(unexpected_input(StepId::SourceConfig, &other)),
        };
        self.session.last_source = Some(submitted.clone());

        let address = submitted
            .btc_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);

        if sensor_type.requires_address() && address.is_none() {
            let form = self
                .source_form(sensor_type)
                .error(FIELD_BASE, StepError::BtcAddressRequired);
            return Ok(StepAction::Show(form));
        }
        if let Some(error) = validation::check_interval(submitted.update_frequency) {
            let form = self.source_form(sensor_type).error(FIELD_UPDATE_FREQUENCY, error);
            return Ok(StepAction::Show(form));
        }

        let config = MiningConfig {
            sensor_type,
            label: trimmed(submitted.label.as_deref()),
            update_frequency: submitted.update_frequency,
            btc_address: if sensor_type.requires_address() { address } else { None },
        };

        self.finish_create(RecordData::Mining(config), None)
    }

    // ========== Finalization ==========

    /// Abort action if another record already uses the key of `data`
    fn reject_duplicate(&self, data: &RecordData, own_entry: Option<&str>) -> Option<StepAction> {
        let key = data.unique_key();
        let existing = match self.ctx.store.unique_keys() {
            Ok(existing) => existing,
            Err(e) => {
                error!("Error reading record keys: {}", e);
                return Some(upstream_failure(format!("Error reading records: {}", e)));
            }
        };

        if validation::check_unique_key(&key, &existing, own_entry) {
            return None;
        }

        Some(duplicate_key(data))
    }

    fn finish_create(&mut self, data: RecordData, min_time: Option<f64>) -> Result<StepAction> {
        if let Some(action) = self.reject_duplicate(&data, None) {
            return Ok(action);
        }

        let entry = match self.ctx.store.create_record(&data) {
            Ok(entry) => entry,
            Err(e) if e.is_constraint_violation() => return Ok(duplicate_key(&data)),
            Err(e) => {
                error!("Error creating entry: {}", e);
                return Ok(upstream_failure(format!("Error creating entry: {}", e)));
            }
        };

        if let Some(min_time) = min_time {
            self.apply_settings(min_time);
        }
        self.notify(&entry);

        Ok(StepAction::Finish {
            outcome: Outcome::Finished,
            result: FlowResult::CreateEntry {
                entry_id: entry.entry_id,
                title: entry.title,
            },
        })
    }

    /// Update the shared settings and persist them. Returns a warning if the
    /// write failed.
    fn apply_settings(&self, min_time: f64) -> Option<String> {
        let snapshot = {
            let mut settings = self.ctx.settings.write();
            settings.min_time_between_requests = min_time;
            settings.clone()
        };

        match self.ctx.store.save_settings(&snapshot) {
            Ok(()) => None,
            Err(e) => {
                warn!("Error saving integration settings: {}", e);
                Some(format!("Error saving settings: {}", e))
            }
        }
    }

    /// Run every listener; failures become warnings
    fn notify(&self, entry: &ConfigEntry) -> Vec<String> {
        let mut warnings = Vec::new();
        for listener in &self.ctx.listeners {
            if let Err(e) = listener.on_record_finalized(entry) {
                warn!("Record listener failed for entry {}: {}", entry.entry_id, e);
                warnings.push(e.to_string());
            }
        }
        warnings
    }
}

fn unexpected_input(step: StepId, input: &StepInput) -> AppError {
    AppError::Validation(format!("Unexpected input for step {}: {:?}", step, input))
}

fn duplicate_key(data: &RecordData) -> StepAction {
    info!("A record with key {} is already configured", data.unique_key());
    StepAction::Finish {
        outcome: Outcome::Aborted,
        result: FlowResult::Abort {
            reason: AbortReason::DuplicateKey,
        },
    }
}

fn upstream_failure(message: String) -> StepAction {
    StepAction::Finish {
        outcome: Outcome::Aborted,
        result: FlowResult::Abort {
            reason: AbortReason::UpstreamFailure(message),
        },
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    match value.trim() {
        "" => fallback.to_string(),
        value => value.to_string(),
    }
}

/// Submitted value, or the previous one when the field was left blank
fn keep_unless_blank(value: Option<&str>, previous: &str) -> String {
    non_blank_or(value.unwrap_or_default(), previous)
}

/// Multipliers for `selection`, reusing each item's previous multiplier
fn carried_multipliers(previous: &PriceConfig, selection: &[String]) -> Value {
    let pairs = previous.pairs();
    let carried: Vec<String> = selection
        .iter()
        .map(|id| {
            pairs
                .iter()
                .find(|(item, _)| item == id)
                .map(|(_, multiplier)| multiplier.clone())
                .unwrap_or_else(|| "1".to_string())
        })
        .collect();
    Value::String(join_list(&carried))
}
