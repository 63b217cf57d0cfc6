//! Extraction prompts.
//!
//! The prompts pin the response format the parsers in `extract` depend on;
//! changing wording here requires revisiting those parsers.

/// Prompt for the registry office name at the head of the ledger.
pub const REGISTRY_OFFICE_PROMPT: &str = r#"以下のOCRテキストから、冒頭に書かれている「登記所の名前」のみを抽出してください。
- 出力はその登記所名のみ（例：「大阪法務局」など）
- 余計な説明文や記号、接頭語、接尾語は出力しないでください
- 出力は一行だけ、名前だけにしてください

【テキスト開始】
{text}
【テキスト終了】"#;

/// Prompt for inheritance/bequest transfer addresses in the ledger.
pub const INHERITANCE_ADDRESSES_PROMPT: &str = r#"以下のテキストは不動産登記の受付帳から抽出したOCR結果です。この中から、「所有権移転相続・法人合併」もしくは「所有権移転相続法人合併」と記載された登記行に該当する住所（例：「東近江市佐野町801 外2」など）のみをすべて抽出してください。

制約条件：
- 抽出対象は「所有権移転相続・法人合併」もしくは「所有権移転相続法人合併」と記載された行に限ります。
- 抽出するのは登記対象の住所部分のみ（「既)土地 〇〇市〇〇町〇〇番地 外〇」など）。
- 重複していてもすべて出力してください。
- 出力は1行に1住所、住所のみを出力してください。

【テキスト開始】
{text}
【テキスト終了】"#;

/// Prompt for owner facts in a downloaded certificate.
pub const OWNER_INFO_PROMPT: &str = r#"以下は登記簿のOCRテキストです。この中から以下の情報を抽出してください。

1. 「原因」が「相続」または「遺贈」である所有権移転に関して、**最も新しい**氏名とその所有者住所（共有者の住所）。
2. その相続によって取得された不動産の所在地（住所）。

- 出力形式:
  氏名: ○○○○
  所有者住所: ○○県○○市○○…
  不動産所在地: ○○県○○市○○…

【テキスト開始】
{text}
【テキスト終了】"#;

/// Fill the `{text}` placeholder of a prompt template.
pub fn render(template: &str, text: &str) -> String {
    template.replace("{text}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_document_text() {
        let rendered = render(REGISTRY_OFFICE_PROMPT, "大阪法務局 受付帳");
        assert!(rendered.contains("大阪法務局 受付帳"));
        assert!(!rendered.contains("{text}"));
    }
}
