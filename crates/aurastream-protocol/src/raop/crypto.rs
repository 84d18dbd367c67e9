//! AES-128-CBC decryption of RAOP audio payloads (spec.md §6).
//!
//! Each packet's payload is decrypted independently with the IV reset to
//! the session IV (not chained across packets); only whole 16-byte blocks
//! are encrypted; any trailing partial block is left as plaintext ALAC
//! data.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

type Decryptor = cbc::Decryptor<Aes128>;

/// Decrypt `payload` in place using `key`/`iv`, reused fresh for every
/// packet. Only whole 16-byte blocks are touched; any remainder at the
/// end is untouched (it was never encrypted by the sender).
pub fn decrypt_payload(key: &[u8; 16], iv: &[u8; 16], payload: &mut [u8]) {
    let whole_blocks = payload.len() / 16;
    if whole_blocks == 0 {
        return;
    }
    let (blocks, _remainder) = payload.split_at_mut(whole_blocks * 16);
    let decryptor = Decryptor::new(key.into(), iv.into());
    decryptor
        .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(blocks)
        .expect("whole-block slice length is always a multiple of the block size");
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::{BlockEncryptMut, KeyIvInit as _};

    #[test]
    fn decrypt_reverses_encrypt() {
        let key = [0x42u8; 16];
        let iv = [0x11u8; 16];
        let plaintext = [7u8; 32];

        let mut ciphertext = plaintext;
        let encryptor = cbc::Encryptor::<Aes128>::new(&key.into(), &iv.into());
        encryptor
            .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut ciphertext, 32)
            .unwrap();

        let mut buf = ciphertext;
        decrypt_payload(&key, &iv, &mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn trailing_partial_block_is_left_alone() {
        let key = [1u8; 16];
        let iv = [2u8; 16];
        let mut payload = vec![9u8; 16 + 5];
        let tail = payload[16..].to_vec();
        decrypt_payload(&key, &iv, &mut payload);
        assert_eq!(&payload[16..], tail.as_slice());
    }
}
