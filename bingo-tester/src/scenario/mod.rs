use crate::logic::CardPlan;

pub mod catalog;

/// A named, scripted card session with its expectations.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub plan: CardPlan,
}

impl TestScenario {
    #[must_use]
    pub const fn new(key: &'static str, name: &'static str, plan: CardPlan) -> Self {
        Self { key, name, plan }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = match name.trim().to_lowercase().as_str() {
        "row" => "first-row".to_string(),
        "center-cross" | "cross" => "centre-cross".to_string(),
        "wrap" => "reward-wrap".to_string(),
        "random" => "random-sweep".to_string(),
        other => other.to_string(),
    };
    catalog::catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.key == key)
}

/// Keys and display names of every catalogued scenario.
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog::catalog_scenarios()
        .iter()
        .map(|scenario| (scenario.key, scenario.name))
        .collect()
}

/// Expand requested names (`all` selects the whole catalog), returning the
/// scenarios found and the names that matched nothing.
pub fn resolve_scenarios(requested: &[String]) -> (Vec<TestScenario>, Vec<String>) {
    let mut found: Vec<TestScenario> = Vec::new();
    let mut unknown = Vec::new();

    for name in requested {
        if name.trim().eq_ignore_ascii_case("all") {
            for scenario in catalog::catalog_scenarios() {
                if !found.iter().any(|existing| existing.key == scenario.key) {
                    found.push(scenario);
                }
            }
            continue;
        }
        match get_scenario(name) {
            Some(scenario) => {
                if !found.iter().any(|existing| existing.key == scenario.key) {
                    found.push(scenario);
                }
            }
            None => unknown.push(name.clone()),
        }
    }

    (found, unknown)
}
