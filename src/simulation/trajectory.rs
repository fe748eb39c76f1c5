//! Sampled simulation output.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::observables::{Observable, ResolvedObservable};
use crate::error::ModelError;
use crate::network::generator::Network;

/// Time series with a `time` column followed by one column per output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub headers: Vec<String>,
    pub data: Vec<Vec<f64>>,
    /// Stopped by an event budget or an interrupt before `t_end`.
    pub truncated: bool,
}

impl Trajectory {
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.data.iter().map(|row| row[0]).collect()
    }

    pub fn column(&self, header: &str) -> Option<Vec<f64>> {
        let j = self.headers.iter().position(|h| h == header)?;
        Some(self.data.iter().map(|row| row[j]).collect())
    }

    pub fn last(&self) -> Option<&[f64]> {
        self.data.last().map(Vec::as_slice)
    }

    /// Samples as a (rows, columns) matrix.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.data.len(), self.headers.len()), |(i, j)| self.data[i][j])
    }
}

/// What each row records besides time.
#[derive(Clone, Debug)]
pub(crate) enum Outputs {
    Species(usize),
    Observables(Vec<ResolvedObservable>),
}

impl Outputs {
    pub(crate) fn resolve(network: &Network, observables: &[Observable]) -> Result<Self, ModelError> {
        if observables.is_empty() {
            return Ok(Outputs::Species(network.species.len()));
        }
        observables
            .iter()
            .map(|o| o.resolve(network))
            .collect::<Result<Vec<_>, _>>()
            .map(Outputs::Observables)
    }

    pub(crate) fn headers(&self, network: &Network) -> Vec<String> {
        let mut headers = vec!["time".to_string()];
        match self {
            Outputs::Species(n) => headers.extend((0..*n).map(|i| network.species_label(i))),
            Outputs::Observables(list) => headers.extend(list.iter().map(|o| o.name.clone())),
        }
        headers
    }

    fn row(&self, time: f64, quantities: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(1 + quantities.len());
        row.push(time);
        match self {
            Outputs::Species(_) => row.extend_from_slice(quantities),
            Outputs::Observables(list) => row.extend(list.iter().map(|o| o.value(quantities))),
        }
        row
    }
}

/// Accumulates rows for one run.
pub(crate) struct Recorder<'a> {
    outputs: &'a Outputs,
    headers: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(outputs: &'a Outputs, headers: Vec<String>, capacity: usize) -> Self {
        Self {
            outputs,
            headers,
            data: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn record(&mut self, time: f64, quantities: &[f64]) {
        self.data.push(self.outputs.row(time, quantities));
    }

    /// Largest absolute output change between the last two rows.
    pub(crate) fn last_change(&self) -> Option<f64> {
        let [.., previous, current] = self.data.as_slice() else {
            return None;
        };
        Some(
            previous[1..]
                .iter()
                .zip(&current[1..])
                .map(|(a, b)| (b - a).abs())
                .fold(0.0, f64::max),
        )
    }

    pub(crate) fn finish(self, truncated: bool) -> Trajectory {
        Trajectory {
            headers: self.headers,
            data: self.data,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory() -> Trajectory {
        Trajectory {
            headers: vec!["time".to_string(), "A".to_string(), "B".to_string()],
            data: vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.5, 0.5]],
            truncated: false,
        }
    }

    #[test]
    fn test_column_lookup() {
        let t = trajectory();
        assert_eq!(t.column("B"), Some(vec![0.0, 0.5]));
        assert_eq!(t.column("C"), None);
        assert_eq!(t.times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_to_array_shape() {
        let array = trajectory().to_array();
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array[[1, 2]], 0.5);
    }

    #[test]
    fn test_recorder_change() {
        let outputs = Outputs::Species(2);
        let mut recorder = Recorder::new(&outputs, vec![], 2);
        recorder.record(0.0, &[1.0, 2.0]);
        assert_eq!(recorder.last_change(), None);
        recorder.record(1.0, &[1.5, 1.0]);
        assert_eq!(recorder.last_change(), Some(1.0));
    }
}
