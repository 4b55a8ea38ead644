//! Legacy transactions built from the Solana message types.
//!
//! The message is compiled by `solana-message`; the gateway wallet signs its
//! serialized bytes and the signed transaction goes out bincode-encoded.

use solana_hash::Hash;
use solana_instruction::Instruction;
use solana_message::Message;
use solana_signature::Signature;
use solana_transaction::Transaction;

use crate::domain::{BlockchainError, Pubkey};

pub use solana_instruction::AccountMeta;
pub use solana_sdk_ids::system_program::ID as SYSTEM_PROGRAM_ID;

/// Compiles instructions into a message paid for by `payer`.
#[must_use]
pub fn compile_message(payer: &Pubkey, instructions: &[Instruction], blockhash: Hash) -> Message {
    Message::new_with_blockhash(instructions, Some(payer), &blockhash)
}

/// Wire bytes of `message` carrying one signature per required signer.
pub fn encode_signed(
    message: Message,
    signatures: Vec<Signature>,
) -> Result<Vec<u8>, BlockchainError> {
    let required = usize::from(message.header.num_required_signatures);
    if signatures.len() != required {
        return Err(BlockchainError::InvalidSignature(format!(
            "Message needs {} signatures, got {}",
            required,
            signatures.len()
        )));
    }

    let mut transaction = Transaction::new_unsigned(message);
    transaction.signatures = signatures;
    bincode::serialize(&transaction)
        .map_err(|e| BlockchainError::TransactionFailed(format!("Encoding failed: {}", e)))
}

/// Decodes a base58 blockhash returned by the node.
pub fn parse_blockhash(blockhash: &str) -> Result<Hash, BlockchainError> {
    blockhash
        .parse()
        .map_err(|e| BlockchainError::RpcError(format!("Invalid blockhash {}: {}", blockhash, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    fn instruction(payer: Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            key(9),
            &[1, 2, 3],
            vec![
                AccountMeta::new_readonly(key(4), false),
                AccountMeta::new(key(3), false),
                AccountMeta::new(payer, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )
    }

    #[test]
    fn test_compile_puts_payer_first() {
        let payer = key(1);
        let message = compile_message(&payer, &[instruction(payer)], Hash::new_from_array([5u8; 32]));

        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.header.num_readonly_signed_accounts, 0);
        assert_eq!(message.header.num_readonly_unsigned_accounts, 3);
        assert_eq!(message.recent_blockhash, Hash::new_from_array([5u8; 32]));
        assert_eq!(message.instructions[0].data, vec![1, 2, 3]);
    }

    #[test]
    fn test_encode_signed_prefixes_signatures() {
        let payer = key(1);
        let message = compile_message(&payer, &[instruction(payer)], Hash::default());
        let message_bytes = message.serialize();

        let wire = encode_signed(message, vec![Signature::from([9u8; 64])]).unwrap();

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &[9u8; 64]);
        assert_eq!(&wire[65..], message_bytes.as_slice());
        assert_eq!(&wire[65 + 4..65 + 36], payer.as_ref());
    }

    #[test]
    fn test_encode_signed_rejects_missing_signature() {
        let payer = key(1);
        let message = compile_message(&payer, &[instruction(payer)], Hash::default());
        let result = encode_signed(message, Vec::new());
        assert!(matches!(result, Err(BlockchainError::InvalidSignature(_))));
    }

    #[test]
    fn test_parse_blockhash() {
        let encoded = bs58::encode([3u8; 32]).into_string();
        assert_eq!(
            parse_blockhash(&encoded).unwrap(),
            Hash::new_from_array([3u8; 32])
        );
        assert!(parse_blockhash("0OIl").is_err());
    }
}
