//! Property-based tests for the obt CLI

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::path::PathBuf;

    use obt_crypto::{ContentPayload, ContentType, FundsRequestContent};

    use crate::config::{CliOverrides, Config};
    use crate::output::{OutputFormat, OutputFormatter};

    fn output_format() -> impl Strategy<Value = OutputFormat> {
        prop_oneof![
            Just(OutputFormat::Table),
            Just(OutputFormat::Json),
            Just(OutputFormat::Quiet),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_output_format_display_parses_back(format in output_format()) {
            prop_assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }

        // Any flag that is set wins over the file; unset flags leave it alone.
        #[test]
        fn test_overrides_precedence(
            file_format in output_format(),
            flag_format in proptest::option::of(output_format()),
            file_verbose in any::<bool>(),
            flag_verbose in proptest::option::of(any::<bool>()),
            flag_path in proptest::option::of("[a-z]{1,12}"),
        ) {
            let mut config = Config::default();
            config.output.format = file_format.to_string();
            config.output.verbose = file_verbose;
            config.keystore.path = Some(PathBuf::from("file-keys.json"));

            let overrides = CliOverrides {
                output_format: flag_format.map(|f| f.to_string()),
                verbose: flag_verbose,
                debug: None,
                keystore_path: flag_path.clone().map(PathBuf::from),
            };
            let config = config.with_overrides(&overrides);
            prop_assert!(config.validate().is_ok());

            prop_assert_eq!(&config.output.format, &flag_format.unwrap_or(file_format).to_string());
            prop_assert_eq!(config.output.verbose, flag_verbose.unwrap_or(file_verbose));
            prop_assert_eq!(
                &config.keystore.path,
                &Some(flag_path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("file-keys.json")))
            );
        }

        // JSON output stays parseable whatever the payload holds.
        #[test]
        fn test_json_decrypt_output_is_valid(
            address in "\\PC{0,30}",
            memo in "\\PC{0,60}",
        ) {
            let payload = ContentPayload::Request(FundsRequestContent {
                payee_public_address: address.clone(),
                amount: "1".into(),
                chain_code: "FIO".into(),
                token_code: "FIO".into(),
                memo: memo.clone(),
                ..Default::default()
            });
            let formatter = OutputFormatter::new(OutputFormat::Json, false);
            let out: serde_json::Value = serde_json::from_str(&formatter.format_decrypted(&payload)).unwrap();

            prop_assert_eq!(out["data"]["content"]["payee_public_address"].as_str(), Some(address.as_str()));
            prop_assert_eq!(out["data"]["content"]["memo"].as_str(), Some(memo.as_str()));
            prop_assert_eq!(out["data"]["content_type"].as_str(), Some(ContentType::Request.schema_name()));
        }
    }
}
