//! CSV 收件人源
//!
//! 逐行读取 CSV 文件，每行产出一个 `Recipient`。
//!
//! - 有表头时按列名定位 `name` / `email`（不区分大小写），其余列作为 attributes
//! - 无表头时前两列为 name / email
//! - 支持双引号字段（`""` 转义、引号内逗号），不支持跨行字段
//! - 空行忽略；无法解析的行产出 `MalformedRecord`，继续读取下一行
//! - 读取 IO 错误产出 `Read` 并结束流

use std::path::Path;

use contracts::{Recipient, RecipientSource, SourceError};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, instrument};
use validator::ValidateEmail;

const BOM: char = '\u{feff}';

/// CSV 读取选项
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// 第一行为表头
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { has_header: true }
    }
}

/// 列位置映射
#[derive(Debug, Clone)]
struct ColumnMap {
    name: usize,
    email: usize,
    /// (列索引, 属性名)
    attributes: Vec<(usize, String)>,
}

impl ColumnMap {
    fn positional() -> Self {
        Self {
            name: 0,
            email: 1,
            attributes: Vec::new(),
        }
    }

    fn from_header(header: &[String]) -> Option<Self> {
        let find = |wanted: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        };
        let name = find("name")?;
        let email = find("email")?;

        let attributes = header
            .iter()
            .enumerate()
            .filter(|(idx, h)| *idx != name && *idx != email && !h.trim().is_empty())
            .map(|(idx, h)| (idx, h.trim().to_string()))
            .collect();

        Some(Self {
            name,
            email,
            attributes,
        })
    }

    fn min_columns(&self) -> usize {
        self.name.max(self.email) + 1
    }
}

/// CSV 收件人源
pub struct CsvRecipientSource<R> {
    locator: String,
    lines: Lines<R>,
    columns: ColumnMap,
    /// 最近读取的行号 (1-based)
    line_no: usize,
    finished: bool,
}

impl CsvRecipientSource<BufReader<File>> {
    /// 打开 CSV 文件
    ///
    /// # Errors
    /// 文件无法打开或表头缺少 `name` / `email` 列时返回 `SourceError::Unavailable`。
    #[instrument(name = "csv_source_open", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let locator = path.display().to_string();
        let file = File::open(path)
            .await
            .map_err(|e| SourceError::unavailable(&locator, e.to_string()))?;
        Self::from_reader(locator, BufReader::new(file), options).await
    }
}

impl<R> CsvRecipientSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// 从任意异步 reader 构造（测试用内存数据）
    pub async fn from_reader(
        locator: impl Into<String>,
        reader: R,
        options: CsvOptions,
    ) -> Result<Self, SourceError> {
        let locator = locator.into();
        let mut source = Self {
            locator,
            lines: reader.lines(),
            columns: ColumnMap::positional(),
            line_no: 0,
            finished: false,
        };

        if options.has_header {
            source.read_header().await?;
        }

        Ok(source)
    }

    async fn read_header(&mut self) -> Result<(), SourceError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| SourceError::unavailable(&self.locator, e.to_string()))?;
            let Some(line) = line else {
                // 空文件：没有收件人
                self.finished = true;
                return Ok(());
            };
            self.line_no += 1;

            let line = line.trim_start_matches(BOM);
            if line.trim().is_empty() {
                continue;
            }

            let header = split_fields(line).map_err(|reason| {
                SourceError::unavailable(&self.locator, format!("invalid header: {reason}"))
            })?;
            self.columns = ColumnMap::from_header(&header).ok_or_else(|| {
                SourceError::unavailable(
                    &self.locator,
                    "header must contain 'name' and 'email' columns",
                )
            })?;
            debug!(
                columns = header.len(),
                attributes = self.columns.attributes.len(),
                "csv header parsed"
            );
            return Ok(());
        }
    }

    fn parse_row(&self, line: &str) -> Result<Recipient, SourceError> {
        let line_no = self.line_no;
        let fields = split_fields(line).map_err(|reason| SourceError::malformed(line_no, reason))?;

        let needed = self.columns.min_columns();
        if fields.len() < needed {
            return Err(SourceError::malformed(
                line_no,
                format!("expected at least {needed} columns, found {}", fields.len()),
            ));
        }

        let name = fields[self.columns.name].trim();
        if name.is_empty() {
            return Err(SourceError::malformed(line_no, "empty name"));
        }

        let email = fields[self.columns.email].trim();
        if !email.validate_email() {
            return Err(SourceError::malformed(
                line_no,
                format!("invalid email '{email}'"),
            ));
        }

        let mut recipient = Recipient::new(name, email);
        for (idx, key) in &self.columns.attributes {
            if let Some(value) = fields.get(*idx) {
                recipient
                    .attributes
                    .insert(key.clone(), value.trim().to_string());
            }
        }
        Ok(recipient)
    }
}

impl<R> RecipientSource for CsvRecipientSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn next_record(&mut self) -> Option<Result<Recipient, SourceError>> {
        while !self.finished {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    self.line_no += 1;
                    let line = if self.line_no == 1 {
                        line.trim_start_matches(BOM).to_string()
                    } else {
                        line
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(self.parse_row(&line));
                }
                Ok(None) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SourceError::Read {
                        reason: format!("line {}: {e}", self.line_no + 1),
                    }));
                }
            }
        }
        None
    }
}

/// 拆分一行 CSV 字段
///
/// 未加引号的字段去除首尾空白；加引号的字段原样保留。
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(finish_field(std::mem::take(&mut field), quoted));
                quoted = false;
            }
            '"' if !quoted && field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quoted = true;
            }
            // 引号字段结束后到逗号之间的空白
            c if quoted && c.is_whitespace() => {}
            '"' => return Err("unexpected quote inside field".to_string()),
            _ if quoted => return Err("unexpected text after quoted field".to_string()),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(finish_field(field, quoted));
    Ok(fields)
}

fn finish_field(field: String, quoted: bool) -> String {
    if quoted {
        field
    } else {
        field.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn source_from(text: &str, options: CsvOptions) -> CsvRecipientSource<&[u8]> {
        CsvRecipientSource::from_reader("memory", text.as_bytes(), options)
            .await
            .unwrap()
    }

    async fn collect<R: AsyncBufRead + Unpin + Send>(
        source: &mut CsvRecipientSource<R>,
    ) -> Vec<Result<Recipient, SourceError>> {
        let mut out = Vec::new();
        while let Some(record) = source.next_record().await {
            out.push(record);
        }
        out
    }

    #[test]
    fn test_split_plain_fields() {
        assert_eq!(
            split_fields(" Alice , a@x.com,Acme").unwrap(),
            vec!["Alice", "a@x.com", "Acme"]
        );
    }

    #[test]
    fn test_split_quoted_fields() {
        assert_eq!(
            split_fields(r#""Smith, Bob" , b@x.com,"say ""hi""""#).unwrap(),
            vec!["Smith, Bob", "b@x.com", "say \"hi\""]
        );
        assert_eq!(split_fields(r#"a,"",c"#).unwrap(), vec!["a", "", "c"]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        let err = split_fields(r#""Alice, a@x.com"#).unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[tokio::test]
    async fn test_header_with_attributes() {
        let text = "Email,Name,Company\na@x.com,Alice,Acme\nb@x.com,Bob,\n";
        let mut source = source_from(text, CsvOptions::default()).await;
        let records = collect(&mut source).await;

        assert_eq!(records.len(), 2);
        let alice = records[0].as_ref().unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.email, "a@x.com");
        assert_eq!(alice.attributes.get("Company").map(String::as_str), Some("Acme"));

        let bob = records[1].as_ref().unwrap();
        assert_eq!(bob.attributes.get("Company").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_without_header() {
        let text = "Alice,a@x.com\n\nBob,b@x.com\n";
        let mut source = source_from(text, CsvOptions { has_header: false }).await;
        let emails: Vec<_> = collect(&mut source)
            .await
            .into_iter()
            .map(|r| r.unwrap().email)
            .collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_malformed_rows_do_not_stop_reading() {
        let text = "name,email\nAlice,a@x.com\nBob,not-an-email\n,c@x.com\nDave\nErin,e@x.com\n";
        let mut source = source_from(text, CsvOptions::default()).await;
        let records = collect(&mut source).await;

        assert_eq!(records.len(), 5);
        assert!(records[0].is_ok());
        assert_eq!(
            records[1],
            Err(SourceError::malformed(3, "invalid email 'not-an-email'"))
        );
        assert_eq!(records[2], Err(SourceError::malformed(4, "empty name")));
        assert!(matches!(
            records[3],
            Err(SourceError::MalformedRecord { line: 5, .. })
        ));
        assert_eq!(records[4].as_ref().unwrap().name, "Erin");
    }

    #[tokio::test]
    async fn test_header_requires_name_and_email() {
        let result =
            CsvRecipientSource::from_reader("memory", "name,phone\n".as_bytes(), CsvOptions::default())
                .await;
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mut source = source_from("", CsvOptions::default()).await;
        assert!(source.next_record().await.is_none());
    }

    #[tokio::test]
    async fn test_bom_is_stripped() {
        let text = "\u{feff}name,email\nAlice,a@x.com\n";
        let mut source = source_from(text, CsvOptions::default()).await;
        assert!(source.next_record().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvRecipientSource::open(dir.path().join("nope.csv"), CsvOptions::default()).await;
        match result {
            Err(SourceError::Unavailable { locator, .. }) => assert!(locator.ends_with("nope.csv")),
            _ => panic!("expected Unavailable"),
        }
    }

    #[tokio::test]
    async fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,email,city").unwrap();
        writeln!(file, "\"Smith, Alice\",alice@x.com,Paris").unwrap();
        file.flush().unwrap();

        let mut source = CsvRecipientSource::open(file.path(), CsvOptions::default())
            .await
            .unwrap();
        let alice = source.next_record().await.unwrap().unwrap();
        assert_eq!(alice.name, "Smith, Alice");
        assert_eq!(alice.attributes.get("city").map(String::as_str), Some("Paris"));
        assert!(source.next_record().await.is_none());
        assert!(source.next_record().await.is_none());
    }
}
