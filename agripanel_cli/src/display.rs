use comfy_table::{presets::NOTHING, *};
use itertools::izip;

use agripanel::COL;
use polars::prelude::{DataFrame, DataType};

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

pub fn display_missing_rate(rates: &DataFrame) -> anyhow::Result<()> {
    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("Column").add_attribute(Attribute::Bold),
        Cell::new("Missing Rate").add_attribute(Attribute::Bold),
    ]);
    for (column, rate) in izip!(
        rates.column(COL::SUMMARY_COLUMN)?.str()?,
        rates.column(COL::MISSING_RATE)?.f64()?,
    ) {
        table.add_row(vec![
            column.unwrap_or_default().to_string(),
            format!("{:.3}", rate.unwrap_or_default()),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}

pub fn display_year_counts(counts: &DataFrame, year_column: &str) -> anyhow::Result<()> {
    let years = counts.column(year_column)?.cast(&DataType::Int64)?;
    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Observations").add_attribute(Attribute::Bold),
    ]);
    for (year, observations) in izip!(years.i64()?, counts.column(COL::OBSERVATIONS)?.u32()?) {
        table.add_row(vec![
            year.map(|y| y.to_string()).unwrap_or_default(),
            observations.map(|o| o.to_string()).unwrap_or_default(),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}
