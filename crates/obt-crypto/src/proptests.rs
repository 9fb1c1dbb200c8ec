#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::content::{decrypt_content, encrypt_content, ContentPayload, FundsRequestContent, RecordContent};
    use crate::envelope::{self, EnvelopeError};
    use crate::key_agreement::derive_keys;
    use crate::keys::PrivateKey;
    use crate::schema::{self, ContentType, SchemaVariant};

    fn private_key() -> impl Strategy<Value = PrivateKey> {
        any::<[u8; 32]>().prop_filter_map("scalar out of range", |bytes| PrivateKey::from_bytes(&bytes).ok())
    }

    fn text() -> impl Strategy<Value = String> + Clone {
        "[ -~]{0,40}"
    }

    fn request() -> impl Strategy<Value = FundsRequestContent> {
        request_with(text())
    }

    fn request_with(optional: impl Strategy<Value = String> + Clone) -> impl Strategy<Value = FundsRequestContent> {
        (text(), text(), text(), text(), optional.clone(), optional.clone(), optional).prop_map(
            |(payee_public_address, amount, chain_code, token_code, memo, hash, offline_url)| {
                FundsRequestContent {
                    payee_public_address,
                    amount,
                    chain_code,
                    token_code,
                    memo,
                    hash,
                    offline_url,
                }
            },
        )
    }

    fn record() -> impl Strategy<Value = RecordContent> {
        (
            (text(), text(), text(), text(), text()),
            (text(), text(), text(), text(), text()),
        )
            .prop_map(|((payer, payee, amount, chain, token), (status, obt_id, memo, hash, url))| {
                RecordContent {
                    payer_public_address: payer,
                    payee_public_address: payee,
                    amount,
                    chain_code: chain,
                    token_code: token,
                    status,
                    obt_id,
                    memo,
                    hash,
                    offline_url: url,
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_agreement_symmetry(a in private_key(), b in private_key()) {
            let ab = derive_keys(&a, &b.public_key()).unwrap();
            let ba = derive_keys(&b, &a.public_key()).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn test_request_round_trip(a in private_key(), b in private_key(), content in request()) {
            let payload = ContentPayload::Request(content);
            let encoded = encrypt_content(&a, &b.public_key().to_string(), &payload).unwrap();
            let decoded =
                decrypt_content(&b, &a.public_key().to_string(), &encoded, ContentType::Request).unwrap();
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn test_record_round_trip(a in private_key(), b in private_key(), content in record()) {
            let payload = ContentPayload::Record(content);
            let encoded = encrypt_content(&a, &b.public_key().to_string(), &payload).unwrap();
            let decoded =
                decrypt_content(&b, &a.public_key().to_string(), &encoded, ContentType::Record).unwrap();
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn test_envelope_bit_flip_is_mac_invalid(
            plaintext in proptest::collection::vec(any::<u8>(), 1..100),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let keys = derive_keys(
                &PrivateKey::from_bytes(&[0x11; 32]).unwrap(),
                &PrivateKey::from_bytes(&[0x22; 32]).unwrap().public_key(),
            )
            .unwrap();
            let mut sealed = envelope::seal(&plaintext, &keys, None).unwrap();
            let i = position.index(sealed.len());
            sealed[i] ^= 1 << bit;

            prop_assert_eq!(envelope::open(&sealed, &keys), Err(EnvelopeError::MacInvalid));
        }

        #[test]
        fn test_ciphertext_is_padded_to_next_block(len in 1usize..80) {
            let keys = derive_keys(
                &PrivateKey::from_bytes(&[0x33; 32]).unwrap(),
                &PrivateKey::from_bytes(&[0x44; 32]).unwrap().public_key(),
            )
            .unwrap();
            let plaintext = vec![0x5a; len];
            let env = envelope::encrypt(&plaintext, keys.cipher_key(), keys.mac_key(), None).unwrap();

            prop_assert_eq!(env.ciphertext().len(), (len / 16 + 1) * 16);
            prop_assert_eq!(envelope::decrypt(&env, keys.cipher_key(), keys.mac_key()).unwrap(), plaintext);
        }

        #[test]
        fn test_strict_and_compat_decode_alike(content in request_with("[ -~]{2,40}")) {
            let payload = ContentPayload::Request(content.clone());
            let full = serde_json::to_value(&content).unwrap();
            let serde_json::Value::Object(full) = full else { unreachable!() };

            let strict = schema::encode(schema::schema_for(ContentType::Request, SchemaVariant::Strict), &full).unwrap();
            let compat = schema::encode(
                schema::schema_for(ContentType::Request, SchemaVariant::Compat),
                &payload.to_fields().unwrap(),
            )
            .unwrap();

            let from_strict = schema::decode_with_fallback(ContentType::Request, &strict).unwrap();
            let from_compat = schema::decode_with_fallback(ContentType::Request, &compat).unwrap();
            prop_assert_eq!(
                ContentPayload::from_fields(ContentType::Request, from_strict.fields).unwrap(),
                payload.clone()
            );
            prop_assert_eq!(
                ContentPayload::from_fields(ContentType::Request, from_compat.fields).unwrap(),
                payload
            );
        }
    }
}
