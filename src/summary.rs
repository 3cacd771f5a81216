use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::model::{ExclusionCounts, ExclusionKind, ForecastRecord, ModelRate, SummaryOutcome};

/// Median-prediction and observed totals for one (model, forecast_date)
/// group, summed across every target_end_date the forecast covers.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodSums {
    prediction: f64,
    truth: f64,
}

/// How often each model's forecasted period total exceeded the observed
/// total ("sufficient procurement"). One outcome per (forecast_date, model)
/// group; the per-model rate is the mean of those outcomes.
pub fn total_overprediction(records: &[ForecastRecord]) -> SummaryOutcome {
    let (periods_by_model, mut exclusions) = period_sums(records);

    let mut rates = BTreeMap::new();
    for (model, periods) in periods_by_model {
        if periods.is_empty() {
            exclusions.record(ExclusionKind::EmptyModelGroup);
            warn!(model = %model, "no valid periods for overprediction summary");
            continue;
        }

        let outcomes_true = periods
            .values()
            .filter(|sums| sums.prediction > sums.truth)
            .count();
        rates.insert(
            model,
            ModelRate {
                groups_used: periods.len(),
                outcomes_true,
                rate: outcomes_true as f64 / periods.len() as f64,
            },
        );
    }

    SummaryOutcome { rates, exclusions }
}

/// How often each model predicted an increase for periods where the observed
/// total actually increased. Periods are ordered by forecast_date ascending;
/// each is compared against its immediate predecessor, and only periods with
/// a strict observed increase count toward the rate. The first period has no
/// predecessor and is never counted.
pub fn correctly_increases(records: &[ForecastRecord]) -> SummaryOutcome {
    let (periods_by_model, mut exclusions) = period_sums(records);

    let mut rates = BTreeMap::new();
    for (model, periods) in periods_by_model {
        if periods.len() < 2 {
            exclusions.record(ExclusionKind::InsufficientHistory);
            warn!(
                model = %model,
                periods = periods.len(),
                "fewer than two periods, direction summary undefined"
            );
            continue;
        }

        let mut ordered: Vec<(NaiveDate, PeriodSums)> = periods.into_iter().collect();
        ordered.sort_by_key(|(forecast_date, _)| *forecast_date);

        let mut groups_used = 0;
        let mut outcomes_true = 0;
        for window in ordered.windows(2) {
            let (_, previous) = window[0];
            let (_, current) = window[1];
            if current.truth > previous.truth {
                groups_used += 1;
                if current.prediction > previous.prediction {
                    outcomes_true += 1;
                }
            }
        }

        if groups_used == 0 {
            exclusions.record(ExclusionKind::EmptyModelGroup);
            warn!(model = %model, "no observed increases, direction summary undefined");
            continue;
        }

        rates.insert(
            model,
            ModelRate {
                groups_used,
                outcomes_true,
                rate: outcomes_true as f64 / groups_used as f64,
            },
        );
    }

    SummaryOutcome { rates, exclusions }
}

/// Sum medians and observed values per (model, forecast_date). A group
/// containing any record without a joined observation is excluded whole and
/// counted, never summed partially.
fn period_sums(
    records: &[ForecastRecord],
) -> (BTreeMap<String, BTreeMap<NaiveDate, PeriodSums>>, ExclusionCounts) {
    #[derive(Default)]
    struct Accumulator {
        prediction: f64,
        truth: f64,
        missing: bool,
    }

    let mut groups: BTreeMap<String, BTreeMap<NaiveDate, Accumulator>> = BTreeMap::new();
    for record in records {
        let group = groups
            .entry(record.model.clone())
            .or_default()
            .entry(record.forecast_date)
            .or_default();
        group.prediction += record.median;
        match record.true_value {
            Some(truth) => group.truth += truth,
            None => group.missing = true,
        }
    }

    let mut exclusions = ExclusionCounts::default();
    let mut sums = BTreeMap::new();
    for (model, periods) in groups {
        let mut kept = BTreeMap::new();
        for (forecast_date, acc) in periods {
            if acc.missing {
                exclusions.record(ExclusionKind::MissingObservation);
                warn!(
                    model = %model,
                    forecast_date = %forecast_date,
                    "period dropped, missing observation for at least one target date"
                );
                continue;
            }
            kept.insert(
                forecast_date,
                PeriodSums {
                    prediction: acc.prediction,
                    truth: acc.truth,
                },
            );
        }
        sums.insert(model, kept);
    }

    (sums, exclusions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    fn record(
        model: &str,
        forecast_date: &str,
        target_end_date: &str,
        median: f64,
        true_value: Option<f64>,
    ) -> ForecastRecord {
        ForecastRecord {
            model: model.to_owned(),
            forecast_date: date(forecast_date),
            target_end_date: date(target_end_date),
            median,
            lower: median * 0.8,
            upper: median * 1.2,
            true_value,
        }
    }

    /// One period per forecast date, prediction vs truth given directly.
    fn periods(model: &str, pairs: &[(&str, f64, f64)]) -> Vec<ForecastRecord> {
        pairs
            .iter()
            .map(|&(forecast_date, prediction, truth)| {
                record(model, forecast_date, forecast_date, prediction, Some(truth))
            })
            .collect()
    }

    #[test]
    fn overprediction_scenario_from_mixed_outcomes() {
        // true [100, 150, 120] vs predicted [90, 140, 130]: only the last
        // period overshoots, 1 of 3.
        let table = periods(
            "ets",
            &[
                ("2019-07-01", 90.0, 100.0),
                ("2019-07-08", 140.0, 150.0),
                ("2019-07-15", 130.0, 120.0),
            ],
        );

        let outcome = total_overprediction(&table);
        let rate = &outcome.rates["ets"];
        assert_eq!(rate.groups_used, 3);
        assert_eq!(rate.outcomes_true, 1);
        assert_eq!(rate.percent(), "33%");
        assert_eq!(outcome.exclusions.total(), 0);
    }

    #[test]
    fn overprediction_rate_is_one_when_every_period_overshoots() {
        let table = periods(
            "arima",
            &[("2019-07-01", 150.0, 100.0), ("2019-07-08", 200.0, 150.0)],
        );

        let outcome = total_overprediction(&table);
        let rate = &outcome.rates["arima"];
        assert_eq!(rate.rate, 1.0);
        assert_eq!(rate.percent(), "100%");
    }

    #[test]
    fn overprediction_rate_is_zero_when_every_period_undershoots() {
        let table = periods(
            "arima",
            &[("2019-07-01", 90.0, 100.0), ("2019-07-08", 140.0, 150.0)],
        );

        let outcome = total_overprediction(&table);
        let rate = &outcome.rates["arima"];
        assert_eq!(rate.rate, 0.0);
        assert_eq!(rate.percent(), "0%");
    }

    #[test]
    fn overprediction_sums_across_target_dates_within_a_period() {
        // Two horizons issued the same day: 60+70=130 predicted vs
        // 50+60=110 observed, a single overshooting group.
        let table = vec![
            record("ets", "2019-07-01", "2019-07-07", 60.0, Some(50.0)),
            record("ets", "2019-07-01", "2019-07-14", 70.0, Some(60.0)),
        ];

        let outcome = total_overprediction(&table);
        let rate = &outcome.rates["ets"];
        assert_eq!(rate.groups_used, 1);
        assert_eq!(rate.outcomes_true, 1);
    }

    #[test]
    fn period_with_missing_observation_is_dropped_whole() {
        let table = vec![
            record("ets", "2019-07-01", "2019-07-07", 60.0, Some(50.0)),
            record("ets", "2019-07-01", "2019-07-14", 70.0, None),
            record("ets", "2019-07-08", "2019-07-14", 80.0, Some(90.0)),
        ];

        let outcome = total_overprediction(&table);
        let rate = &outcome.rates["ets"];
        assert_eq!(rate.groups_used, 1);
        assert_eq!(rate.outcomes_true, 0);
        assert_eq!(outcome.exclusions.missing_observation, 1);
    }

    #[test]
    fn model_with_no_valid_periods_is_omitted_not_errored() {
        let table = vec![record("ets", "2019-07-01", "2019-07-07", 60.0, None)];

        let outcome = total_overprediction(&table);
        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.exclusions.missing_observation, 1);
        assert_eq!(outcome.exclusions.empty_model_group, 1);
    }

    #[test]
    fn direction_scenario_counts_only_observed_increases() {
        // true sums [100, 150, 120], predicted [90, 200, 110]: d1->d2 is the
        // only observed increase and the prediction rose too, so 100%.
        let table = periods(
            "ets",
            &[
                ("2019-07-01", 90.0, 100.0),
                ("2019-07-08", 200.0, 150.0),
                ("2019-07-15", 110.0, 120.0),
            ],
        );

        let outcome = correctly_increases(&table);
        let rate = &outcome.rates["ets"];
        assert_eq!(rate.groups_used, 1);
        assert_eq!(rate.outcomes_true, 1);
        assert_eq!(rate.percent(), "100%");
    }

    #[test]
    fn direction_misses_when_prediction_moves_against_observed_increase() {
        let table = periods(
            "arima",
            &[("2019-07-01", 90.0, 100.0), ("2019-07-08", 85.0, 150.0)],
        );

        let outcome = correctly_increases(&table);
        let rate = &outcome.rates["arima"];
        assert_eq!(rate.groups_used, 1);
        assert_eq!(rate.outcomes_true, 0);
        assert_eq!(rate.percent(), "0%");
    }

    #[test]
    fn direction_with_single_period_is_insufficient_history() {
        let table = periods("ets", &[("2019-07-01", 90.0, 100.0)]);

        let outcome = correctly_increases(&table);
        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.exclusions.insufficient_history, 1);
    }

    #[test]
    fn direction_with_no_observed_increase_yields_no_row() {
        // Strictly decreasing truth: undefined, not 0%.
        let table = periods(
            "ets",
            &[
                ("2019-07-01", 90.0, 150.0),
                ("2019-07-08", 80.0, 120.0),
                ("2019-07-15", 70.0, 100.0),
            ],
        );

        let outcome = correctly_increases(&table);
        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.exclusions.empty_model_group, 1);
    }

    #[test]
    fn direction_orders_periods_by_forecast_date_not_input_order() {
        // Same data as the worked scenario, shuffled on input.
        let mut table = periods(
            "ets",
            &[
                ("2019-07-15", 110.0, 120.0),
                ("2019-07-01", 90.0, 100.0),
                ("2019-07-08", 200.0, 150.0),
            ],
        );
        table.rotate_left(1);

        let outcome = correctly_increases(&table);
        let rate = &outcome.rates["ets"];
        assert_eq!(rate.groups_used, 1);
        assert_eq!(rate.outcomes_true, 1);
    }

    #[test]
    fn models_are_summarized_independently() {
        let mut table = periods(
            "ets",
            &[("2019-07-01", 150.0, 100.0), ("2019-07-08", 200.0, 150.0)],
        );
        table.extend(periods(
            "arima",
            &[("2019-07-01", 90.0, 100.0), ("2019-07-08", 140.0, 150.0)],
        ));

        let outcome = total_overprediction(&table);
        assert_eq!(outcome.rates["ets"].rate, 1.0);
        assert_eq!(outcome.rates["arima"].rate, 0.0);
        assert_eq!(
            outcome.rates.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["arima", "ets"]
        );
    }

    #[test]
    fn summaries_are_deterministic_over_the_same_table() {
        let table = periods(
            "ensemble",
            &[
                ("2019-07-01", 90.0, 100.0),
                ("2019-07-08", 200.0, 150.0),
                ("2019-07-15", 110.0, 120.0),
            ],
        );

        assert_eq!(total_overprediction(&table), total_overprediction(&table));
        assert_eq!(correctly_increases(&table), correctly_increases(&table));
    }
}
