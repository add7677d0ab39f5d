use std::collections::BTreeMap;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Block, BorderType, Borders, Clear, Padding, Row, Table, Widget},
};

use crate::config::{key_event_to_string, KeyBindings};

#[derive(Debug)]
pub struct Help {
    keybindings: Vec<(String, String)>,
    column_spacing: u16,
    margin_vertical: u16,
    margin_horizontal: u16,
}

impl Help {
    /// One row per action, listing every key bound to it.
    pub fn new(keybindings: &KeyBindings) -> Self {
        let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for (event, action) in keybindings.iter() {
            let label = action.describe();
            if !label.is_empty() {
                grouped.entry(label).or_default().push(key_event_to_string(event));
            }
        }
        let keybindings = grouped
            .into_iter()
            .map(|(label, mut keys)| {
                keys.sort();
                (keys.join(", "), label.to_string())
            })
            .collect();

        Self { keybindings, column_spacing: 3, margin_vertical: 1, margin_horizontal: 2 }
    }
}

impl Widget for Help {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let key_length = self.keybindings.iter().map(|(key, _)| key.len()).max().unwrap_or(0) as u16;
        let val_length = self.keybindings.iter().map(|(_, val)| val.len()).max().unwrap_or(0) as u16;

        // + column_spacing + margin*2 + border
        let width = key_length + val_length + self.column_spacing + (self.margin_horizontal * 2) + 2;
        // + margin*2 + header + border
        let height = self.keybindings.len() as u16 + (self.margin_vertical * 2) + 2 + 2;

        let [area] = Layout::horizontal([Constraint::Length(width)]).flex(Flex::Center).areas(area);
        let [area] = Layout::vertical([Constraint::Length(height)]).flex(Flex::Center).areas(area);

        let rows: Vec<Row> = self.keybindings.into_iter().map(|(key, val)| Row::new(vec![key, val])).collect();
        let table = Table::new(rows, [Constraint::Length(key_length), Constraint::Min(val_length)])
            .column_spacing(self.column_spacing)
            .header(Row::new(vec!["Key", "Command"]).style(Style::new().bold()).bottom_margin(1))
            .block(
                Block::new()
                    .title("Controls")
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::new().bold().fg(Color::Cyan))
                    .padding(Padding::symmetric(self.margin_horizontal, self.margin_vertical)),
            );

        Clear.render(area, buf);
        table.render(area, buf);
    }
}
