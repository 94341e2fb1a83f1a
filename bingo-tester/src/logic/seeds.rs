use anyhow::{Result, bail};

const DEFAULT_SEED: u64 = 1337;

/// Resolve CLI seed tokens into seeds, keeping first-seen order.
///
/// Accepts decimal integers (negative values use their magnitude) and
/// `0x`-prefixed hex. An empty list yields the default seed.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds: Vec<u64> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let seed = parse_seed(token)?;
        if !seeds.contains(&seed) {
            seeds.push(seed);
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }

    Ok(seeds)
}

fn parse_seed(token: &str) -> Result<u64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        let digits = hex.replace('_', "");
        if let Ok(value) = u64::from_str_radix(&digits, 16) {
            return Ok(value);
        }
    }

    if let Ok(value) = token.parse::<u64>() {
        return Ok(value);
    }

    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }

    bail!("Unrecognized seed token: {token}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_decimal_negative_and_hex() {
        let raw = vec![
            "42".to_string(),
            "-7".to_string(),
            "0xFF".to_string(),
            "42".to_string(),
        ];
        assert_eq!(resolve_seed_inputs(&raw).unwrap(), vec![42, 7, 255]);
    }

    #[test]
    fn empty_input_uses_default_seed() {
        assert_eq!(resolve_seed_inputs(&[]).unwrap(), vec![DEFAULT_SEED]);
        assert_eq!(
            resolve_seed_inputs(&[" ".to_string()]).unwrap(),
            vec![DEFAULT_SEED]
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = resolve_seed_inputs(&["banana".to_string()]).unwrap_err();
        assert!(err.to_string().contains("banana"));
    }
}
