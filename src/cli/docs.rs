//! Documentation content for the till CLI

use std::fmt::Write;

use super::CliError;
use crate::registry::FunctionRegistry;

/// Available documentation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCategory {
    Syntax,
    Operators,
    Statements,
    Methods,
    Dates,
    Templates,
}

impl DocCategory {
    /// Parse category name from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "syntax" => Some(Self::Syntax),
            "operators" | "ops" => Some(Self::Operators),
            "statements" | "statement" | "control_flow" => Some(Self::Statements),
            "methods" | "method" => Some(Self::Methods),
            "dates" | "date" | "times" | "time" => Some(Self::Dates),
            "templates" | "template" => Some(Self::Templates),
            _ => None,
        }
    }
}

/// Get the docs overview (category listing)
pub fn get_docs_overview() -> &'static str {
    r#"TILLSCRIPT DOCUMENTATION

tillscript is a formula and automation-rule language for point-of-sale hosts.
Expressions compute prices, discounts and conditions against order data;
statement scripts automate rules; templates embed expressions in text.

DOCUMENTATION CATEGORIES

  syntax       Literals, variables, maps, arrays and member access
  operators    Arithmetic, comparison, logical and assignment operators
  statements   var, if, loops, functions, try/catch and run
  methods      Methods on strings, lists and maps
  dates        Date and time literals, arithmetic and suffix units
  templates    [=expression] placeholders

QUICK REFERENCE

  Order.Quantity * Order.Price     Member access and arithmetic
  Round(total * 1.2, d: 2)         Call with a named argument
  if total > 100 then discount = 5 Conditional statement
  #2024-03-01# + 7 days            Date literal with a suffix call

Run 'till doc <category>' for detailed documentation.
Run 'till functions' to list the registered functions.
"#
}

/// Get documentation for a specific category
pub fn get_doc_category(name: &str) -> Result<&'static str, CliError> {
    match DocCategory::parse(name) {
        Some(DocCategory::Syntax) => Ok(SYNTAX_DOC),
        Some(DocCategory::Operators) => Ok(OPERATORS_DOC),
        Some(DocCategory::Statements) => Ok(STATEMENTS_DOC),
        Some(DocCategory::Methods) => Ok(METHODS_DOC),
        Some(DocCategory::Dates) => Ok(DATES_DOC),
        Some(DocCategory::Templates) => Ok(TEMPLATES_DOC),
        None => Err(CliError::UnknownCategory(name.to_string())),
    }
}

/// Signatures of every registered function, or the full entry for one.
pub fn get_function_docs(functions: &FunctionRegistry, name: Option<&str>) -> Result<String, CliError> {
    let mut out = String::new();
    match name {
        None => {
            out.push_str("FUNCTIONS\n\n");
            for name in functions.names() {
                if let Some(function) = functions.get_match(name) {
                    let _ = writeln!(out, "  {}", function.meta);
                }
            }
            out.push_str("\nRun 'till functions <name>' for details.\n");
        }
        Some(name) => {
            let meta = &functions
                .get_match(name)
                .ok_or_else(|| CliError::UnknownFunction(name.to_string()))?
                .meta;
            let _ = writeln!(out, "{}", meta);
            if let Some(description) = &meta.description {
                let _ = writeln!(out, "\n  {}", description);
            }
            if !meta.aliases.is_empty() {
                let _ = writeln!(out, "\n  Aliases: {}", meta.aliases.join(", "));
            }
            if meta.is_suffixable {
                let _ = writeln!(out, "  Usable as a suffix: 30 {}", meta.name.to_lowercase());
            }
            if !meta.arguments.is_empty() {
                out.push_str("\n  ARGUMENTS\n");
                for arg in &meta.arguments {
                    let alias = arg.alias.as_ref().map(|a| format!(" (alias {})", a)).unwrap_or_default();
                    let required = if arg.required { "required" } else { "optional" };
                    let _ = writeln!(out, "    {}{}: {}, {}", arg.name, alias, arg.ty.name(), required);
                    for example in &arg.examples {
                        let _ = writeln!(out, "      e.g. {}", example);
                    }
                }
            }
        }
    }
    Ok(out)
}

const SYNTAX_DOC: &str = r#"SYNTAX - Values and Access

LITERALS
  42  3.75          Numbers (integers stay integers)
  "text" 'text'     Strings with \n \t \" escapes
  "Hi ${name}!"     Interpolated string
  true false null
  #2024-03-01#      Date
  #14:30#           Time
  [1, 2, 3]         List
  { qty: 2 }        Map

VARIABLES
  var total = 0, count;
  total = total + 1

  Names are case-sensitive. Assigning to an undeclared name creates it in
  the current scope; a variable first assigned inside a loop body is gone
  after the loop.

MEMBER ACCESS
  Order.Items[0].Price
    Map members, list indexes and host object properties.

    Constraints:
      - A missing map member is null
      - A list index out of range reads as null
      - Negative indexes count from the end

CALLS
  Round(2.345, 2)
  Round(value: 2.345, digits: 2)
  Round(v: 2.345, d: 2)
    Arguments bind by position, name or alias. Function names are
    case-insensitive.

STATEMENT ENDS
  Statements end at ';', at '}', or at a line break before the next token.
"#;

const OPERATORS_DOC: &str = r#"OPERATORS

PRECEDENCE (highest first)
  ! - ++ --         Unary
  * / %             Multiplicative
  + -               Additive
  < <= > >=         Relational
  == !=             Equality
  &&                Logical AND (short-circuit)
  ||                Logical OR (short-circuit)
  = += -= *= /=     Assignment (right associative)

ARITHMETIC
  Integer + Integer = Integer
  0.1 + 0.2         = 0.3 (decimal arithmetic)
  7 / 2             = 3.5
  "4" * 2           = 8 (numeric strings are coerced)
  "Table " + 4      = "Table 4"

  Division or modulo by zero is a runtime error.

EQUALITY
  3 == 3.0          true
  [1, 2] == [1, 2]  true
  Host objects compare by identity.

TRUTHINESS
  null, false, 0, "", [] and {} are falsy. Everything else is truthy.
"#;

const STATEMENTS_DOC: &str = r#"STATEMENTS

CONDITIONALS
  if (total > 100) discount = 10 else discount = 0
  if total > 100 then discount = 10

LOOPS
  while (i < 10) { i++ }
  for (var i = 0; i < 10; i++) { ... }
  for (item in Order.Items) { total += item.Price }

    Map iteration yields keys in sorted order; string iteration yields
    characters. break and continue are only valid inside a loop.

FUNCTIONS
  function tax(amount, rate = 0.2) { return amount * rate; }
  var double = function(x) { return x * 2; };

    Lambdas capture the variables visible where they are created.

EXCEPTIONS
  try { throw "out of stock"; } catch (e) { message = e }

    catch receives the thrown value, or the message of a runtime or host
    error. Syntax errors cannot be caught.

RUN
  run CloseTable
  run CloseTable(4)
    Invoke a function for its effect.
"#;

const METHODS_DOC: &str = r#"METHODS

LISTS
  items.count()  items.length()  items.sum()  items.avg()
  items.min()  items.max()  items.first()  items.last()
  items.sort()  items.sort_desc()  items.reverse()  items.unique()
  items.flatten()  items.join(", ")  items.contains(x)  items.exists()
  items.filter(function(i) { return i.Price > 5; })
  items.map(function(i) { return i.Name; })
  items.any(f)  items.all(f)

STRINGS
  name.upper()  name.lower()  name.trim()  name.length()
  name.split(",")  name.replace("a", "b")  name.contains("x")
  name.startswith("A")  name.endswith("z")  name.matches("^[A-Z]+$")

MAPS
  order.keys()  order.values()  order.count()

ANY VALUE
  value.format("0.00")  value.type()

    Method names are case-insensitive. Host objects dispatch to their
    registered methods first.
"#;

const DATES_DOC: &str = r#"DATES AND TIMES

LITERALS
  #2024-03-01#   #14:30#   #14:30:15#

ARITHMETIC
  date + 7              Adds days
  date - date           Days between
  time + 30             Adds minutes, wrapping past midnight
  time - time           Minutes between

SUFFIX UNITS
  Today + 3 days
  #09:00# + 2 hours
  #09:00# + 45 minutes

FORMATTING
  Today.format("%d/%m/%Y")
  Now.format("%H:%M")
"#;

const TEMPLATES_DOC: &str = r#"TEMPLATES

  Table [=Order.Table]: [=Order.Items.count()] items, total [=Format(Order.Total, "0.00")]

    Each [=expression] is replaced by its value as text. Expressions that
    fail render as empty text. A custom pattern may be given with --pattern;
    its first capture group is the expression.
"#;
