use crate::error::ChainError;
use crate::transaction::Transaction;

/// A block's coinbase must mint only: no inputs, no negative outputs, and
/// no more than `max_reward` in total.
pub fn validate_coinbase(coinbase: &Transaction, max_reward: i64) -> Result<(), ChainError> {
    if !coinbase.is_coinbase() {
        return Err(ChainError::InvalidTransaction(format!(
            "Coinbase {} spends {} inputs",
            coinbase.hash_str(),
            coinbase.inputs().len()
        )));
    }

    let mut minted: i64 = 0;
    for output in coinbase.outputs() {
        if output.value < 0 {
            return Err(ChainError::InvalidTransaction(format!(
                "Coinbase {} pays negative value {}",
                coinbase.hash_str(),
                output.value
            )));
        }
        minted = minted.checked_add(output.value).ok_or_else(|| {
            ChainError::InvalidTransaction(format!(
                "Coinbase {} output value overflow",
                coinbase.hash_str()
            ))
        })?;
    }

    if minted > max_reward {
        return Err(ChainError::InvalidTransaction(format!(
            "Coinbase {} mints {} but the reward is {}",
            coinbase.hash_str(),
            minted,
            max_reward
        )));
    }

    coinbase.validate_size()
}
