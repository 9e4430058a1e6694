use prometheus_exporter::prometheus::{
    HistogramTimer, HistogramVec, IntCounter, IntGauge, IntGaugeVec, Registry,
    register_histogram_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry,
};

/// Head-state gauges and block counters, registered into a registry owned by the caller.
#[derive(Debug, Clone)]
pub struct TransitionMetrics {
    pub last_slot: IntGauge,
    pub last_justified_epoch: IntGauge,
    pub last_prev_justified_epoch: IntGauge,
    pub last_finalized_epoch: IntGauge,
    pub validator_balances: IntGaugeVec,
    pub processed_blocks: IntCounter,
    pub rejected_blocks: IntCounter,
    pub transition_time: HistogramVec,
}

impl TransitionMetrics {
    /// Fails if any of the metric names is already registered in ``registry``.
    pub fn new(registry: &Registry) -> anyhow::Result<Self> {
        Ok(Self {
            last_slot: register_int_gauge_with_registry!(
                "state_last_slot",
                "Slot of the latest head state",
                registry
            )?,
            last_justified_epoch: register_int_gauge_with_registry!(
                "state_last_justified_epoch",
                "Justified epoch of the latest head state",
                registry
            )?,
            last_prev_justified_epoch: register_int_gauge_with_registry!(
                "state_last_prev_justified_epoch",
                "Previous justified epoch of the latest head state",
                registry
            )?,
            last_finalized_epoch: register_int_gauge_with_registry!(
                "state_last_finalized_epoch",
                "Finalized epoch of the latest head state",
                registry
            )?,
            validator_balances: register_int_gauge_vec_with_registry!(
                "state_validator_balances",
                "Balance of each validator in Gwei",
                &["validator"],
                registry
            )?,
            processed_blocks: register_int_counter_with_registry!(
                "chain_processed_blocks_total",
                "Blocks applied to the head state",
                registry
            )?,
            rejected_blocks: register_int_counter_with_registry!(
                "chain_rejected_blocks_total",
                "Blocks rejected by the state transition",
                registry
            )?,
            transition_time: register_histogram_vec_with_registry!(
                "chain_transition_time",
                "Duration of a single slot transition",
                &["kind"],
                registry
            )?,
        })
    }

    pub fn report_checkpoints(
        &self,
        slot: u64,
        justified_epoch: u64,
        previous_justified_epoch: u64,
        finalized_epoch: u64,
    ) {
        self.last_slot.set(to_gauge_value(slot));
        self.last_justified_epoch.set(to_gauge_value(justified_epoch));
        self.last_prev_justified_epoch
            .set(to_gauge_value(previous_justified_epoch));
        self.last_finalized_epoch
            .set(to_gauge_value(finalized_epoch));
    }

    /// One gauge per validator, labelled by its registry index.
    pub fn report_balances<'a>(&self, balances: impl IntoIterator<Item = &'a u64>) {
        for (index, balance) in balances.into_iter().enumerate() {
            set_int_gauge_vec(
                &self.validator_balances,
                to_gauge_value(*balance),
                &[&index.to_string()],
            );
        }
    }

    pub fn start_transition_timer(&self, kind: &str) -> HistogramTimer {
        start_timer_vec(&self.transition_time, &[kind])
    }
}

/// Set the value of a gauge metric
pub fn set_int_gauge_vec(gauge_vec: &IntGaugeVec, value: i64, label_values: &[&str]) {
    gauge_vec.with_label_values(label_values).set(value);
}

/// Start a timer for a histogram metric
pub fn start_timer_vec(histogram_vec: &HistogramVec, label_values: &[&str]) -> HistogramTimer {
    histogram_vec.with_label_values(label_values).start_timer()
}

/// Stop a timer for a histogram metric
pub fn stop_timer(timer: HistogramTimer) {
    timer.observe_duration()
}

fn to_gauge_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
