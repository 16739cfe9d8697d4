pub struct DefaultsConfig {
    pub population_size: usize,
    pub num_offspring: usize,
    pub generations: usize,
    pub seed: u64,
    pub size_penalty: f64,
    pub gate_lambda: f64,
    pub gate_steepness: f64,
    pub gate_middle: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            num_offspring: 10,
            generations: 10,
            seed: 0,
            size_penalty: 0.0,
            gate_lambda: 0.5,
            gate_steepness: 1.0,
            gate_middle: 2.5,
        }
    }
}
