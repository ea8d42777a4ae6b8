//! Signed demands.
//!
//! A demand carries the parameters of a privileged action (creating a scan,
//! generating alt text) to the editor's browser and back. The HMAC over its
//! fields lets the server trust a demand it receives without re-running the
//! authorization that issued it.
//!
//! Wire format is a flat camelCase JSON object. Unknown and missing fields are
//! rejected during deserialization.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::services::signing::{encode_field, DemandSigner, Signable};

/// Context shared by every demand variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandContext {
    pub user_id: u32,
    pub page_id: u32,
    pub language_id: i32,
    pub workspace_id: u32,
}

/// Demand to scan (or locally audit) a rendered page preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScanDemand {
    #[garde(skip)]
    user_id: u32,

    #[garde(skip)]
    page_id: u32,

    #[garde(skip)]
    language_id: i32,

    #[garde(skip)]
    workspace_id: u32,

    #[garde(length(max = 2048))]
    preview_url: String,

    #[garde(ascii, length(min = 64, max = 64))]
    signature: String,
}

impl ScanDemand {
    /// Build a demand and sign it with the process secret.
    pub fn new(signer: &DemandSigner, context: DemandContext, preview_url: impl Into<String>) -> Self {
        let mut demand = Self::with_signature(context, preview_url, String::new());
        demand.signature = signer.sign_value(&demand);
        demand
    }

    /// Rebuild a demand from trusted parts, keeping the supplied signature.
    pub fn with_signature(
        context: DemandContext,
        preview_url: impl Into<String>,
        signature: String,
    ) -> Self {
        Self {
            user_id: context.user_id,
            page_id: context.page_id,
            language_id: context.language_id,
            workspace_id: context.workspace_id,
            preview_url: preview_url.into(),
            signature,
        }
    }

    pub fn validate_signature(&self, signer: &DemandSigner) -> bool {
        signer.verify_value(self)
    }

    pub fn context(&self) -> DemandContext {
        DemandContext {
            user_id: self.user_id,
            page_id: self.page_id,
            language_id: self.language_id,
            workspace_id: self.workspace_id,
        }
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    pub fn page_id(&self) -> u32 {
        self.page_id
    }

    pub fn language_id(&self) -> i32 {
        self.language_id
    }

    pub fn workspace_id(&self) -> u32 {
        self.workspace_id
    }

    pub fn preview_url(&self) -> &str {
        &self.preview_url
    }
}

impl Signable for ScanDemand {
    const TAG: &'static str = "ScanDemand";

    fn signing_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.user_id,
            self.page_id,
            self.language_id,
            self.workspace_id,
            encode_field(&self.preview_url)
        )
    }

    fn signature(&self) -> &str {
        &self.signature
    }
}

/// Demand to generate alt text for the image referenced by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AltTextDemand {
    #[garde(skip)]
    user_id: u32,

    #[garde(skip)]
    page_id: u32,

    #[garde(skip)]
    language_id: i32,

    #[garde(skip)]
    workspace_id: u32,

    #[garde(length(min = 1, max = 64))]
    table: String,

    #[garde(skip)]
    record_id: u32,

    #[garde(inner(length(min = 1, max = 64)))]
    columns: Vec<String>,

    #[garde(ascii, length(min = 64, max = 64))]
    signature: String,
}

impl AltTextDemand {
    pub fn new(
        signer: &DemandSigner,
        context: DemandContext,
        table: impl Into<String>,
        record_id: u32,
        columns: Vec<String>,
    ) -> Self {
        let mut demand = Self::with_signature(context, table, record_id, columns, String::new());
        demand.signature = signer.sign_value(&demand);
        demand
    }

    pub fn with_signature(
        context: DemandContext,
        table: impl Into<String>,
        record_id: u32,
        columns: Vec<String>,
        signature: String,
    ) -> Self {
        Self {
            user_id: context.user_id,
            page_id: context.page_id,
            language_id: context.language_id,
            workspace_id: context.workspace_id,
            table: table.into(),
            record_id,
            columns,
            signature,
        }
    }

    pub fn validate_signature(&self, signer: &DemandSigner) -> bool {
        signer.verify_value(self)
    }

    pub fn context(&self) -> DemandContext {
        DemandContext {
            user_id: self.user_id,
            page_id: self.page_id,
            language_id: self.language_id,
            workspace_id: self.workspace_id,
        }
    }

    pub fn language_id(&self) -> i32 {
        self.language_id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn record_id(&self) -> u32 {
        self.record_id
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Signable for AltTextDemand {
    const TAG: &'static str = "AltTextDemand";

    fn signing_payload(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| encode_field(c)).collect();
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.user_id,
            self.page_id,
            self.language_id,
            self.workspace_id,
            encode_field(&self.table),
            self.record_id,
            columns.join(",")
        )
    }

    fn signature(&self) -> &str {
        &self.signature
    }
}
