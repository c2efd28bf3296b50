//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (validator derive): worker_count 范围, from / subject 非空
//! - template 与 template_path 二选一
//! - 发件人地址合法
//! - source.path 非空
//! - cta_text 需要 cta_link
//! - transport 必填参数齐全

use std::borrow::Cow;

use contracts::{mailbox_address, CampaignBlueprint, ContractError, TransportType};
use validator::{Validate, ValidateEmail, ValidationErrors, ValidationErrorsKind};

/// 校验 CampaignBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    validate_field_rules(blueprint)?;
    validate_template_choice(blueprint)?;
    validate_sender(blueprint)?;
    validate_source(blueprint)?;
    validate_call_to_action(blueprint)?;
    validate_transport(blueprint)?;
    Ok(())
}

/// 字段级规则
fn validate_field_rules(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("<root>".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// 取第一个违规字段 (按字段名排序，保证输出稳定)
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut keys: Vec<&Cow<'static, str>> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        match errors.errors().get(key)? {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(found) = first_violation(nested, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    if let Some(found) = first_violation(nested, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// template / template_path 二选一
fn validate_template_choice(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    let campaign = &blueprint.campaign;
    match (&campaign.template, &campaign.template_path) {
        (Some(_), Some(_)) => Err(ContractError::config_validation(
            "campaign.template / campaign.template_path",
            "set either 'template' or 'template_path', not both",
        )),
        (None, None) => Err(ContractError::config_validation(
            "campaign.template",
            "a body template is required ('template' or 'template_path')",
        )),
        _ => Ok(()),
    }
}

/// 发件人地址
fn validate_sender(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    let address = mailbox_address(&blueprint.campaign.from);
    if !address.validate_email() {
        return Err(ContractError::config_validation(
            "campaign.from",
            format!("'{}' is not a valid sender address", blueprint.campaign.from),
        ));
    }
    Ok(())
}

/// 收件人来源
fn validate_source(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    if blueprint.source.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "source.path",
            "source path cannot be empty",
        ));
    }
    Ok(())
}

/// CTA 文本需要链接
fn validate_call_to_action(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    let campaign = &blueprint.campaign;
    let has_link = campaign
        .cta_link
        .as_deref()
        .is_some_and(|link| !link.trim().is_empty());
    if campaign.cta_text.is_some() && !has_link {
        return Err(ContractError::config_validation(
            "campaign.cta_link",
            "cta_text is set but cta_link is missing",
        ));
    }
    Ok(())
}

/// transport 参数
fn validate_transport(blueprint: &CampaignBlueprint) -> Result<(), ContractError> {
    let transport = &blueprint.transport;
    match transport.transport_type {
        TransportType::Log => Ok(()),
        TransportType::File => match transport.params.get("dir") {
            Some(dir) if !dir.trim().is_empty() => Ok(()),
            _ => Err(ContractError::config_validation(
                "transport.params.dir",
                "file transport requires a 'dir' parameter",
            )),
        },
        TransportType::Smtp => {
            if let Some(port) = transport.params.get("port") {
                port.parse::<u16>().map_err(|_| {
                    ContractError::config_validation(
                        "transport.params.port",
                        format!("invalid port '{port}'"),
                    )
                })?;
            }
            if let Some(timeout) = transport.params.get("timeout_ms") {
                timeout.parse::<u64>().map_err(|_| {
                    ContractError::config_validation(
                        "transport.params.timeout_ms",
                        format!("invalid timeout '{timeout}'"),
                    )
                })?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BodyFormat, CampaignConfig, ConfigVersion, DispatchSettings, SourceConfig,
        TransportConfig,
    };
    use std::collections::{BTreeMap, HashMap};

    fn minimal_blueprint() -> CampaignBlueprint {
        CampaignBlueprint {
            version: ConfigVersion::V1,
            campaign: CampaignConfig {
                from: "News <news@example.com>".into(),
                subject: "Hello {{name}}".into(),
                template: Some("Hi {{name}}".into()),
                template_path: None,
                template_body: None,
                body_format: BodyFormat::Text,
                cta_text: None,
                cta_link: None,
                variables: BTreeMap::new(),
            },
            source: SourceConfig {
                path: "recipients.csv".into(),
                has_header: true,
            },
            dispatch: DispatchSettings::default(),
            transport: TransportConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut bp = minimal_blueprint();
        bp.dispatch.worker_count = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("dispatch.worker_count"), "got: {err}");
        assert!(err.contains("between 1 and 1024"), "got: {err}");
    }

    #[test]
    fn test_both_templates() {
        let mut bp = minimal_blueprint();
        bp.campaign.template_path = Some("body.txt".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not both"), "got: {err}");
    }

    #[test]
    fn test_no_template() {
        let mut bp = minimal_blueprint();
        bp.campaign.template = None;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("template is required"), "got: {err}");
    }

    #[test]
    fn test_invalid_sender() {
        let mut bp = minimal_blueprint();
        bp.campaign.from = "News <not-an-address>".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not a valid sender address"), "got: {err}");
    }

    #[test]
    fn test_cta_without_link() {
        let mut bp = minimal_blueprint();
        bp.campaign.cta_text = Some("Click".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cta_link"), "got: {err}");
    }

    #[test]
    fn test_file_transport_requires_dir() {
        let mut bp = minimal_blueprint();
        bp.transport = TransportConfig {
            transport_type: TransportType::File,
            params: HashMap::new(),
        };
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("'dir'"), "got: {err}");
    }

    #[test]
    fn test_smtp_invalid_port() {
        let mut bp = minimal_blueprint();
        bp.transport = TransportConfig {
            transport_type: TransportType::Smtp,
            params: HashMap::from([("port".to_string(), "seventy".to_string())]),
        };
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("invalid port"), "got: {err}");
    }

    #[test]
    fn test_empty_source_path() {
        let mut bp = minimal_blueprint();
        bp.source.path = "".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }
}
