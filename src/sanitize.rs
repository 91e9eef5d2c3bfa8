// 機器名の無害化
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//

/// シェルで問題になる文字
const OFFENDING_UNIX_CHARS: &[char] = &[
    ';', '&', '|', '<', '>', '`', '\'', '$', '(', ')', '{', '}', '[', ']', '#', ':', '/',
];

/// シート名に使えない文字
const OFFENDING_SHEET_CHARS: &[char] = &['*', '?', '\\'];

/// シート名の最大文字数
pub const SHEET_TITLE_MAX_LEN: usize = 31;

/// コマンドラインで問題になる文字(空白を含む)を'_'に置き換える
pub fn sanitize_unix_command(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_whitespace() || OFFENDING_UNIX_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// 表計算ソフトで列が分かれてしまうタブを'_'に置き換える
pub fn sanitize_spreadsheet_tabs(input: &str) -> String {
    input.replace('\t', "_")
}

/// 機器名をファイル名、シート名、JSONキーのどれにも使えるようにする
pub fn sanitize_device_name(input: &str) -> String {
    sanitize_spreadsheet_tabs(&sanitize_unix_command(input))
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect()
}

/// シート名にする(31文字まで)
pub fn sheet_title(input: &str) -> String {
    sanitize_device_name(input)
        .chars()
        .map(|c| {
            if OFFENDING_SHEET_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .take(SHEET_TITLE_MAX_LEN)
        .collect()
}

/// 機器一覧の sanitized_device_name とシート名に使う名前。名前がなければデバイスID
pub fn device_sheet_name(device_name: &str, device_id: u32) -> String {
    match sheet_title(device_name) {
        name if name.is_empty() => device_id.to_string(),
        name => name,
    }
}

/// 既に使われているシート名と重なったときの名前("<名前>_<デバイスID>")
pub fn unique_sheet_name(sheet_name: &str, device_id: u32) -> String {
    let suffix = format!("_{device_id}");
    let head = sheet_name
        .chars()
        .take(SHEET_TITLE_MAX_LEN.saturating_sub(suffix.len()))
        .collect::<String>();
    format!("{head}{suffix}")
}

#[test]
fn test1() {
    assert_eq!(sanitize_unix_command("AHU-1 (Roof)"), "AHU-1__Roof_");
    assert_eq!(sanitize_unix_command("a;b&c|d<e>f`g'h$i"), "a_b_c_d_e_f_g_h_i");
    assert_eq!(sanitize_unix_command("{x}[y]#z:1/2"), "_x__y__z_1_2");
    assert_eq!(sanitize_unix_command("plain-name_01"), "plain-name_01");
}

#[test]
fn test2() {
    assert_eq!(sanitize_spreadsheet_tabs("a\tb"), "a_b");
    assert_eq!(sanitize_device_name("FCU\t3:Level 2"), "FCU_3_Level_2");
    assert_eq!(sanitize_device_name("Kühlung"), "K_hlung");
}

#[test]
fn test3() {
    assert_eq!(sheet_title("what?*\\"), "what___");
    let long = "A".repeat(40);
    assert_eq!(sheet_title(&long).len(), SHEET_TITLE_MAX_LEN);
}

#[test]
fn test4() {
    assert_eq!(device_sheet_name("AHU 1", 1001), "AHU_1");
    assert_eq!(device_sheet_name("", 1001), "1001");
    assert_eq!(device_sheet_name("AHU*1", 1001), "AHU_1");
    assert_eq!(
        device_sheet_name("Building 12 Air Handling Unit North Wing 3", 1001),
        "Building_12_Air_Handling_Unit_N"
    );
    // 何度通しても変わらない
    let name = device_sheet_name("Building 12 Air Handling Unit North Wing 3", 1001);
    assert_eq!(device_sheet_name(&name, 1001), name);

    let unique = unique_sheet_name("Building_12_Air_Handling_Unit_N", 4194302);
    assert_eq!(unique, "Building_12_Air_Handlin_4194302");
    assert!(unique.len() <= SHEET_TITLE_MAX_LEN);
}
