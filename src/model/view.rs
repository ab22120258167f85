use std::collections::BTreeSet;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::calendar::WorkCalendar;
use super::ids::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ZoomLevel {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Quarter,
    Year,
    /// Fit the whole project into the visible area.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Skin {
    #[default]
    Terrace,
    Dark,
    Material,
    ContrastWhite,
    ContrastBlack,
    Skyblue,
    Meadow,
    Broadway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaleUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

fn one() -> u32 {
    1
}

/// One row of the timeline header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scale {
    pub unit: ScaleUnit,
    /// Units per cell. Default 1.
    #[serde(default = "one")]
    pub step: u32,
    /// Date output format, e.g. "%d %M".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// CSS class used for weekend highlighting (e.g. "weekend").
    #[serde(rename = "cssClass", default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,
}

impl Scale {
    pub fn new(unit: ScaleUnit, format: &str) -> Self {
        Self {
            unit,
            step: 1,
            format: Some(format.to_string()),
            css_class: None,
        }
    }
}

/// A vertical timeline annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: ItemId,
    #[serde(with = "crate::util::flex_date")]
    pub start_date: NaiveDate,
    pub text: String,
    pub title: String,
}

pub const SINGLE_SCALE_HEIGHT: u32 = 40;
pub const MULTI_SCALE_HEIGHT: u32 = 70;

/// Chart presentation state. Everything here is owned by the session and
/// forwarded to the chart whenever it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub zoom: ZoomLevel,
    pub skin: Skin,
    pub scales: Vec<Scale>,
    pub scale_height: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub hidden_weekdays: BTreeSet<u8>,
    pub link_line_width: f64,
    pub link_wrapper_width: f64,
    pub show_links: bool,
    pub tooltips: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomLevel::Day,
            skin: Skin::Terrace,
            scales: vec![Scale::new(ScaleUnit::Day, "%d %M")],
            scale_height: SINGLE_SCALE_HEIGHT,
            hidden_weekdays: BTreeSet::new(),
            link_line_width: 2.0,
            link_wrapper_width: 20.0,
            show_links: true,
            tooltips: true,
        }
    }
}

impl ViewConfig {
    pub fn calendar(&self) -> WorkCalendar {
        WorkCalendar::from_hidden(self.hidden_weekdays.iter().copied())
    }

    /// Replace the scale rows; the header height follows the row count.
    pub fn set_scales(&mut self, scales: Vec<Scale>) {
        self.scale_height = if scales.len() >= 2 {
            MULTI_SCALE_HEIGHT
        } else {
            SINGLE_SCALE_HEIGHT
        };
        self.scales = scales;
    }

    pub fn highlights_weekends(&self) -> bool {
        self.scales.iter().any(|s| s.css_class.is_some())
    }
}
