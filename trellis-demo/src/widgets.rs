//! Widgets shown by the deferrable page, with their mock data.
//!
//! Each widget renders to plain text lines.

/// Something a ready fragment can show.
pub trait Widget {
    fn render(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: &'static str,
    pub value: u32,
}

/// A bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    points: Vec<ChartPoint>,
}

impl ChartData {
    const BAR_WIDTH: f64 = 30.0;

    pub fn new(points: Vec<ChartPoint>) -> Self {
        Self { points }
    }

    pub fn monthly() -> Self {
        Self::new(vec![
            ChartPoint { label: "Jan", value: 100 },
            ChartPoint { label: "Feb", value: 150 },
            ChartPoint { label: "Mar", value: 120 },
            ChartPoint { label: "Apr", value: 180 },
        ])
    }

    pub fn quarterly() -> Self {
        Self::new(vec![
            ChartPoint { label: "Q1", value: 350 },
            ChartPoint { label: "Q2", value: 420 },
            ChartPoint { label: "Q3", value: 380 },
            ChartPoint { label: "Q4", value: 450 },
        ])
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// Height of a bar as a percentage of the tallest one.
    pub fn bar_height(&self, value: u32) -> f64 {
        let max = self.points.iter().map(|p| p.value).max().unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        f64::from(value) / f64::from(max) * 100.0
    }
}

impl Widget for ChartData {
    fn render(&self) -> Vec<String> {
        self.points
            .iter()
            .map(|point| {
                let width = (self.bar_height(point.value) / 100.0 * Self::BAR_WIDTH).round() as usize;
                format!("{:>4} {} {}", point.label, "#".repeat(width), point.value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: u32,
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    rows: Vec<TableRow>,
}

impl DataTable {
    pub fn sample() -> Self {
        let rows = (1..=3)
            .map(|id| TableRow {
                id,
                name: format!("Item {id}"),
                value: id * 100,
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }
}

impl Widget for DataTable {
    fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("{:<4}{:<10}{:>6}", "ID", "Name", "Value")];
        lines.extend(
            self.rows
                .iter()
                .map(|row| format!("{:<4}{:<10}{:>6}", row.id, row.name, row.value)),
        );
        lines
    }
}

/// Toy map: a few markers on a percentage grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MapWidget {
    /// `(left, top)` in percent.
    markers: Vec<(u32, u32)>,
    grid_lines: Vec<u32>,
}

impl Default for MapWidget {
    fn default() -> Self {
        Self {
            markers: vec![(60, 40), (40, 30), (30, 60)],
            grid_lines: (0..=100).step_by(20).collect(),
        }
    }
}

impl MapWidget {
    pub fn grid_lines(&self) -> &[u32] {
        &self.grid_lines
    }

    pub fn markers(&self) -> &[(u32, u32)] {
        &self.markers
    }
}

impl Widget for MapWidget {
    fn render(&self) -> Vec<String> {
        // One cell per grid step; a marker lands in the cell it falls into.
        let cells = self.grid_lines.len().saturating_sub(1).max(1);
        let step = 100 / cells as u32;
        let cell = |percent: u32| ((percent / step.max(1)) as usize).min(cells - 1);

        (0..cells)
            .map(|row| {
                (0..cells)
                    .map(|col| {
                        let marked = self
                            .markers
                            .iter()
                            .any(|&(left, top)| cell(left) == col && cell(top) == row);
                        if marked {
                            "[*]"
                        } else {
                            "[ ]"
                        }
                    })
                    .collect::<String>()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherWidget {
    pub temperature: i32,
    pub condition: String,
    pub humidity: u32,
    pub wind: u32,
}

impl Default for WeatherWidget {
    fn default() -> Self {
        Self {
            temperature: 22,
            condition: "Partly Cloudy".to_string(),
            humidity: 65,
            wind: 12,
        }
    }
}

impl Widget for WeatherWidget {
    fn render(&self) -> Vec<String> {
        vec![
            format!("{}°C  {}", self.temperature, self.condition),
            format!("Humidity {}%  Wind {} km/h", self.humidity, self.wind),
        ]
    }
}
