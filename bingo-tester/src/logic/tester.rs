use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::logic::card_tester::{CardPlan, CardTester, RunSummary};
use crate::scenario::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    tester: CardTester,
}

impl LogicTester {
    pub const fn new(tester: CardTester) -> Self {
        Self { tester }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.tester.verbose() {
                println!(
                    "🧪 Testing scenario: {} (seed: {})",
                    scenario.name.bright_white(),
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations);
            results.push(result);
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let (successes, failures, performance_data) =
            self.run_plan_iterations(scenario, seed, iterations);

        let avg_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration: avg_duration,
            performance_data,
        }
    }

    fn run_plan_iterations(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> (usize, Vec<String>, Vec<Duration>) {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let verdict = self
                .tester
                .run_plan(&scenario.plan, scenario.key, iteration_seed)
                .map_err(|err| format!("{err:#}"))
                .and_then(|summary| evaluate_expectations(&scenario.plan, &summary));

            match verdict {
                Ok(()) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.tester.verbose() {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?})",
                            i + 1,
                            iterations
                        );
                    }
                }
                Err(err) => {
                    if self.tester.verbose() {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            err.clone().red()
                        );
                    }
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): {err}",
                        i + 1
                    ));
                }
            }
        }

        (successes, failures, performance_data)
    }
}

fn evaluate_expectations(plan: &CardPlan, summary: &RunSummary) -> Result<(), String> {
    if let Some(first) = summary.violations.first() {
        return Err(format!(
            "invariant violated ({} total): {first}",
            summary.violations.len()
        ));
    }
    for expectation in &plan.expectations {
        expectation
            .evaluate(summary)
            .map_err(|err| format!("{err:#}"))?;
    }
    Ok(())
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_micros().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u128::deserialize(deserializer)?;
        Ok(Duration::from_micros(u64::try_from(micros).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let micros: Vec<u128> = durations.iter().map(Duration::as_micros).collect();
        micros.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(micros_vec
            .into_iter()
            .map(|m| Duration::from_micros(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
