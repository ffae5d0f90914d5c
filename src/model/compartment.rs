use crate::error::RateError;
use crate::model::rate::Rate;

/// One node of the compartment network: a reservoir of drug mass with a
/// distribution volume and mutable lists of input and output rate
/// functions. Its position in the shared state vector is fixed at creation
/// and never reassigned; structural edits redirect which compartment owns
/// which rate functions instead.
#[derive(Debug, Clone)]
pub struct Compartment {
    index: usize,
    volume: f64,
    inputs: Vec<Rate>,
    outputs: Vec<Rate>,
}

impl Compartment {
    pub(crate) fn new(
        index: usize,
        volume: f64,
        input: Option<Rate>,
        output: Option<Rate>,
    ) -> Self {
        Self {
            index,
            volume,
            inputs: input.into_iter().collect(),
            outputs: output.into_iter().collect(),
        }
    }

    /// Position of this compartment's quantity within the global state vector.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Distribution volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Net rate of change of this compartment's quantity: the sum of all
    /// input rates minus the sum of all output rates, evaluated at time `t`
    /// against the full state vector `q`.
    pub fn net_rate(&self, t: f64, q: &[f64]) -> Result<f64, RateError> {
        let mut rate = 0.0;
        for f in &self.inputs {
            rate += f.eval(t, q)?;
        }
        for f in &self.outputs {
            rate -= f.eval(t, q)?;
        }
        Ok(rate)
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut Vec<Rate> {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut Vec<Rate> {
        &mut self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rate::RateFn;

    #[test]
    fn net_rate_is_inputs_minus_outputs() {
        let comp = Compartment::new(
            0,
            1.0,
            Some(Rate::Constant { rate: 2.0 }),
            Some(Rate::FirstOrder { k: 1.0, index: 0 }),
        );
        assert_eq!(comp.net_rate(0.0, &[1.0]).unwrap(), 1.0);
        assert_eq!(comp.net_rate(0.0, &[2.0]).unwrap(), 0.0);
        assert_eq!(comp.net_rate(0.0, &[0.0]).unwrap(), 2.0);
    }

    #[test]
    fn rate_errors_propagate_out_of_net_rate() {
        let comp = Compartment::new(
            0,
            1.0,
            Some(Rate::Custom(RateFn::new(|_t, _q| f64::NAN))),
            None,
        );
        let err = comp.net_rate(3.0, &[1.0]).unwrap_err();
        assert_eq!(err, RateError::NonFinite { time: 3.0 });
    }
}
