//! Actual-vs-predicted series merging for the forecast chart

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::parsers::parse_time;
use crate::types::{ForecastPoint, PricePoint};

/// One chart point; either side may be missing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: String,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
}

/// Union of both series keyed by time label, ascending by date value.
///
/// Labels that do not read as dates keep their first-seen order after all
/// dated points. A repeated label keeps the last value seen.
pub fn merge_series(actuals: &[PricePoint], predictions: &[ForecastPoint]) -> Vec<ChartPoint> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut points: Vec<ChartPoint> = Vec::new();

    let mut slot = |time: &str, points: &mut Vec<ChartPoint>| -> usize {
        if let Some(&idx) = index.get(time) {
            return idx;
        }
        points.push(ChartPoint {
            time: time.to_string(),
            actual: None,
            predicted: None,
        });
        index.insert(time.to_string(), points.len() - 1);
        points.len() - 1
    };

    for a in actuals {
        let idx = slot(&a.time, &mut points);
        points[idx].actual = Some(a.actual);
    }
    for p in predictions {
        let idx = slot(&p.time, &mut points);
        points[idx].predicted = Some(p.predicted);
    }

    let mut keyed: Vec<(Option<NaiveDateTime>, usize, ChartPoint)> = points
        .into_iter()
        .enumerate()
        .map(|(i, p)| (parse_time(&p.time), i, p))
        .collect();
    keyed.sort_by(|(ta, ia, _), (tb, ib, _)| match (ta, tb) {
        (Some(x), Some(y)) => x.cmp(y).then(ia.cmp(ib)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => ia.cmp(ib),
    });

    keyed.into_iter().map(|(_, _, p)| p).collect()
}

/// Chart coordinates: x is the point index, y the value
pub fn chart_coords(points: &[ChartPoint]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let mut actual = Vec::new();
    let mut predicted = Vec::new();
    for (i, p) in points.iter().enumerate() {
        if let Some(v) = p.actual {
            actual.push((i as f64, v));
        }
        if let Some(v) = p.predicted {
            predicted.push((i as f64, v));
        }
    }
    (actual, predicted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual(time: &str, v: f64) -> PricePoint {
        PricePoint {
            time: time.to_string(),
            actual: v,
        }
    }

    fn predicted(time: &str, v: f64) -> ForecastPoint {
        ForecastPoint {
            time: time.to_string(),
            predicted: v,
        }
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_series(&[], &[]).is_empty());
    }

    #[test]
    fn test_merge_overlapping_times() {
        let merged = merge_series(
            &[
                actual("2024-05-01 10:10:00", 2.0),
                actual("2024-05-01 10:00:00", 1.0),
            ],
            &[
                predicted("2024-05-01 10:10:00", 2.5),
                predicted("2024-05-01 10:20:00", 3.0),
            ],
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].time, "2024-05-01 10:00:00");
        assert_eq!(merged[0].actual, Some(1.0));
        assert_eq!(merged[0].predicted, None);
        assert_eq!(merged[1].actual, Some(2.0));
        assert_eq!(merged[1].predicted, Some(2.5));
        assert_eq!(merged[2].actual, None);
        assert_eq!(merged[2].predicted, Some(3.0));
    }

    #[test]
    fn test_merge_undated_labels_last() {
        let merged = merge_series(
            &[actual("later", 9.0), actual("2024-05-01 10:00:00", 1.0)],
            &[],
        );
        assert_eq!(merged[0].time, "2024-05-01 10:00:00");
        assert_eq!(merged[1].time, "later");
    }

    #[test]
    fn test_chart_coords_skip_missing_sides() {
        let merged = merge_series(
            &[actual("2024-05-01 10:00:00", 1.0)],
            &[predicted("2024-05-01 10:10:00", 2.0)],
        );
        let (a, p) = chart_coords(&merged);
        assert_eq!(a, vec![(0.0, 1.0)]);
        assert_eq!(p, vec![(1.0, 2.0)]);
    }
}
