use thiserror::Error;

use crate::utils::text;

/// Startup validation failures, one variant per exit code. The display
/// strings are the exact messages printed to stderr.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    #[error("Usage: depot name {{goods qty}}")]
    BadArgs,
    #[error("Invalid name(s)")]
    InvalidName,
    #[error("Invalid quantity")]
    InvalidQuantity,
}

impl UsageError {
    pub fn exit_code(&self) -> i32 {
        match self {
            UsageError::BadArgs => 1,
            UsageError::InvalidName => 2,
            UsageError::InvalidQuantity => 3,
        }
    }
}

/// Validated startup identity: depot name plus its initial goods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotConfig {
    pub name: String,
    pub goods: Vec<(String, i64)>,
}

/// Validate argv (everything after the program name):
/// `name [good qty]...`. Goods come in positional pairs; quantities are
/// non-negative decimal integers.
pub fn parse(args: &[String]) -> Result<DepotConfig, UsageError> {
    let name = args.first().ok_or(UsageError::BadArgs)?;
    if name.is_empty() {
        return Err(UsageError::BadArgs);
    }
    if !text::valid_name(name) {
        return Err(UsageError::InvalidName);
    }

    let goods_args = &args[1..];
    let mut goods = Vec::new();
    if !goods_args.is_empty() {
        if goods_args[0].is_empty() {
            return Err(UsageError::BadArgs);
        }
        if goods_args.len() % 2 != 0 {
            return Err(UsageError::InvalidQuantity);
        }

        for pair in goods_args.chunks(2) {
            let (good, quantity) = (&pair[0], &pair[1]);
            if !text::valid_name(good) {
                return Err(UsageError::InvalidName);
            }
            if !text::is_nonneg_integer(quantity) {
                return Err(UsageError::InvalidQuantity);
            }
            let quantity = quantity
                .parse::<i64>()
                .map_err(|_| UsageError::InvalidQuantity)?;
            goods.push((good.clone(), quantity));
        }
    }

    Ok(DepotConfig {
        name: name.clone(),
        goods,
    })
}
