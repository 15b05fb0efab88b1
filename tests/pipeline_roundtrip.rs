//! End-to-end round trip: build a container file by hand, decrypt it
//! through the public pipeline, and check the recovered payload matches
//! what was encrypted (quantified invariant 2).

use aes::Aes128;
use cbc::cipher::{BlockEncryptMut,KeyIvInit};
use cbc::cipher::block_padding::NoPadding;

use bootctl::crypto::{self,PAGE_SIZE,BOOTID_KEY,BOOTID_IV,OPTION_KEY,EXFAT_HEADER};

type Enc = cbc::Encryptor<Aes128>;

fn encrypt_blocks(key: &[u8;16], iv: &[u8;16], plaintext: &[u8]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    let len = buf.len();
    Enc::new(key.into(),iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf,len)
        .unwrap();
    buf
}

/// Build a 96-byte plaintext OPTION header matching the on-disk layout
/// that `container::BootId` parses.
fn build_option_header(block_count: u64, block_size: u64, header_block_count: u64) -> [u8;96] {
    let mut buf = [0u8;96];
    buf[13] = 0x02; // container_type = OPTION
    buf[14] = 7;    // sequence_number
    buf[15] = 1;    // use_custom_iv = true
    buf[16..20].copy_from_slice(b"GAME"); // game_id
    buf[20..22].copy_from_slice(&2024u16.to_le_bytes()); // target_timestamp.year
    buf[22] = 3;  // month
    buf[23] = 14; // day
    buf[24] = 9;  // hour
    buf[25] = 26; // minute
    buf[26] = 53; // second
    buf[28..32].copy_from_slice(b"OPT2"); // target_version.option
    buf[32..40].copy_from_slice(&block_count.to_le_bytes());
    buf[40..48].copy_from_slice(&block_size.to_le_bytes());
    buf[48..56].copy_from_slice(&header_block_count.to_le_bytes());
    buf
}

#[test]
fn test_option_container_round_trip() {
    let block_size: u64 = PAGE_SIZE as u64;
    let header_block_count: u64 = 1;
    let block_count: u64 = 2; // one page of payload

    let header_pt = build_option_header(block_count,block_size,header_block_count);
    let header_ct = encrypt_blocks(&BOOTID_KEY,&BOOTID_IV,&header_pt);

    let file_iv: [u8;16] = [0xAA;16];
    let data_offset = header_block_count * block_size;
    // Offsets are relative to the start of the decrypted payload, so the
    // first page always uses page_iv(0, F).
    let page_iv = crypto::page_iv(0,&file_iv);

    let mut plaintext_page = vec![0u8;PAGE_SIZE];
    plaintext_page[0..16].copy_from_slice(&EXFAT_HEADER);
    for (i,b) in plaintext_page[16..].iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    let payload_ct = encrypt_blocks(&OPTION_KEY,&page_iv,&plaintext_page);

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("container.bin");
    let mut file_bytes = vec![0u8;data_offset as usize];
    file_bytes[0..96].copy_from_slice(&header_ct);
    file_bytes.extend_from_slice(&payload_ct);
    std::fs::write(&input_path,&file_bytes).unwrap();

    let result = bootctl::pipeline::decrypt_container(&input_path).unwrap();
    assert_eq!(result.output_path.file_name().unwrap().to_str().unwrap(),
        "GAME_OPT2_20240314092653_7.exfat");

    let recovered = std::fs::read(&result.output_path).unwrap();
    assert_eq!(recovered,plaintext_page);
}
