//! Closed table of user-facing Polish strings, keyed by code.
//!
//! Solver and engine code carries codes only; every message a user can see
//! comes from this table. The core never formats a message at runtime
//! beyond simple placeholder substitution done by the caller.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static MESSAGES_PL: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        // Readiness
        ("source.grid_supply_missing", "Brak źródła zasilania sieciowego (GPZ)"),
        ("source.voltage_invalid", "Nieprawidłowe napięcie źródła zasilania"),
        ("source.sk3_invalid", "Nieprawidłowa moc zwarciowa źródła Sk3"),
        ("trunk.catalog_missing", "Odcinek nie ma przypisanego katalogu ani parametrów"),
        ("catalog.materialization_failed", "Parametry z katalogu nie zostały wczytane"),
        ("catalog.binding_missing", "Źródło nie ma przypisanego katalogu"),
        ("transformer.catalog_missing", "Transformator nie ma przypisanego katalogu"),
        (
            "transformer.lv_voltage_missing",
            "Brak napięcia dolnego transformatora (U_dolne) — wymagane z katalogu",
        ),
        ("transformer.uk_invalid", "Nieprawidłowa wartość uk% transformatora"),
        ("trunk.segment_length_missing", "Odcinek nie ma zdefiniowanej długości"),
        ("trunk.segment_missing", "Sieć nie ma żadnych odcinków (gałęzi)"),
        ("station.voltage_missing", "Węzeł nie ma zdefiniowanego napięcia"),
        ("analysis.unknown_type", "Nieznany typ analizy"),
        // Diagnostics
        ("E-D01", "Brak źródła zasilania w sieci"),
        ("E-D02", "Niezgodność poziomów napięć na końcach gałęzi"),
        ("E-D03", "Sieć zawiera rozłączone wyspy"),
        ("E-D04", "Transformator bez zdefiniowanych napięć stron GN/DN"),
        ("E-D05", "Linia bez impedancji i bez odwołania do katalogu"),
        ("E-D06", "Brak danych składowej zerowej dla zwarcia jednofazowego"),
        ("E-D07", "Otwarty łącznik odcina część sieci"),
        ("E-D08", "Więcej niż jeden węzeł bilansujący w jednej wyspie"),
        ("W-D01", "Brak danych składowej zerowej w sieci"),
        ("W-D02", "Skrajne wartości parametrów elementu"),
        ("W-D03", "Więcej niż pięć źródeł przyłączonych do jednego węzła"),
        ("I-D01", "Pełna analiza dostępna — brak blokad"),
        // Eligibility
        (
            "ELIG_FAULT_NODE_EMPTY",
            "Nie wskazano węzła zwarcia — wybierz element na schemacie",
        ),
        (
            "ELIG_SC1F_NO_Z0",
            "Brak danych impedancji zerowej — wymagane dla zwarcia jednofazowego",
        ),
        (
            "ELIG_SC2F_NO_Z2",
            "Brak danych impedancji składowej przeciwnej (Z2) — wymagane dla zwarcia dwufazowego",
        ),
        ("ELIG_NO_SLACK", "Brak węzła bilansującego — wymagany dla rozpływu mocy"),
        ("ELIG_NO_SOURCE", "Brak źródła dla wskazanego pola obliczeniowego"),
        // Run gating and lookups
        ("RUN_NOT_READY", "Sieć nie jest gotowa do obliczeń"),
        ("RUN_BLOCKED", "Obliczenie zablokowane"),
        ("RUN_NOT_FOUND", "Przebieg obliczeniowy nie istnieje"),
        ("RESULT_SET_NOT_FOUND", "Wyniki nie istnieją dla przebiegu"),
        ("STUDY_CASE_NOT_FOUND", "Przypadek obliczeniowy nie istnieje"),
        ("RUN_ILLEGAL_TRANSITION", "Niedozwolona zmiana stanu przebiegu"),
        // Numeric failures
        ("CONVERGENCE_FAILURE", "Obliczenia rozpływu mocy nie osiągnęły zbieżności"),
        ("NUMERICAL_FAILURE", "Błąd numeryczny — macierz układu jest osobliwa"),
        ("VALUE_DOMAIN", "Wynik poza dziedziną liczbową (NaN lub nieskończoność)"),
        ("PARAMETER_INCONSISTENT", "Parametry elementu są wzajemnie sprzeczne"),
        // Short-circuit warnings
        (
            "SC_GRID_SHARE_CLAMPED",
            "Udział sieci sztywnej ujemny — przycięto do zera",
        ),
        (
            "SC_FAULT_IMPEDANCE_IGNORED",
            "Impedancja zwarcia została pominięta (przyjęto zwarcie metaliczne)",
        ),
        (
            "SC_THERMAL_TIME_OUT_OF_TABLE",
            "Czas zwarcia poza tablicą współczynników — użyto przybliżenia κ",
        ),
    ])
});

/// Look up the Polish message for a code.
pub fn message_pl(code: &str) -> Option<&'static str> {
    MESSAGES_PL.get(code).copied()
}

/// Message for a code, falling back to the code itself for unknown codes.
pub fn message_pl_or_code(code: &str) -> &str {
    MESSAGES_PL.get(code).copied().unwrap_or(code)
}

/// Legend labels for the delta comparison overlay.
pub const LEGEND_DELTA_PL: [&str; 3] = ["Bez zmian", "Zmiana", "Brak danych"];

/// Legend labels for the result overlay, ordered by rising severity.
pub const LEGEND_SEVERITY_PL: [&str; 4] = ["Poprawne", "Ostrzeżenie", "Ważne", "Blokujące"];
