use crate::display::CapacityView;
use crate::export::SYSTEM_NAME;
use rust_decimal::Decimal;

pub fn render_public(view: &CapacityView) -> String {
    let full_class = if view.is_full { "full" } else { "" };
    page(
        "Parking Control",
        &PUBLIC_BODY
            .replace("{{AVAILABLE}}", &view.available.to_string())
            .replace("{{OCCUPIED}}", &view.occupied.to_string())
            .replace("{{TOTAL}}", &view.total.to_string())
            .replace("{{PCT_AVAILABLE}}", &format!("{:.0}", view.percent_available))
            .replace("{{PCT_FULL}}", &format!("{:.0}", view.percent_full))
            .replace("{{FULL_CLASS}}", full_class)
            .replace("{{SYSTEM}}", SYSTEM_NAME),
    )
}

pub fn render_login() -> String {
    page("Acesso Administrativo", LOGIN_BODY)
}

pub fn render_admin(price: Decimal) -> String {
    page(
        "Painel Administrativo",
        &ADMIN_BODY.replace("{{PRICE}}", &format!("{price:.2}")),
    )
}

fn page(title: &str, body: &str) -> String {
    LAYOUT.replace("{{TITLE}}", title).replace("{{BODY}}", body)
}

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #0f1419;
      --card: #1a2129;
      --ink: #e8e6e3;
      --muted: #8b949e;
      --available: #3fb950;
      --full: #f85149;
      --accent: #2f81f7;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at center, rgba(232, 230, 227, 0.06) 1px, transparent 1px) 0 0 / 40px 40px, var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(1100px, 100%);
      display: grid;
      gap: 28px;
    }

    h1 {
      text-align: center;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      font-size: clamp(2rem, 5vw, 3.6rem);
      margin: 0;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(240px, 1fr));
      gap: 20px;
    }

    .card {
      background: var(--card);
      border: 2px solid rgba(232, 230, 227, 0.08);
      border-radius: 20px;
      padding: 28px;
      display: grid;
      gap: 14px;
      justify-items: center;
    }

    .label {
      text-transform: uppercase;
      letter-spacing: 0.14em;
      color: var(--muted);
    }

    .big {
      font-size: clamp(4rem, 12vw, 9rem);
      font-weight: 700;
      line-height: 1;
      color: var(--available);
    }

    .big.occupied, .full .big {
      color: var(--full);
    }

    .banner {
      display: none;
      font-size: 2rem;
      font-weight: 700;
      color: var(--full);
      text-transform: uppercase;
    }

    .full .banner {
      display: block;
    }

    .bar {
      width: 100%;
      height: 12px;
      background: rgba(232, 230, 227, 0.1);
      border-radius: 999px;
      overflow: hidden;
    }

    .bar span {
      display: block;
      height: 100%;
      background: var(--available);
      transition: width 700ms ease;
    }

    .bar span.occupied, .full .bar span {
      background: var(--full);
    }

    .value {
      font-size: 1.8rem;
      font-weight: 600;
    }

    .hint, .footer {
      color: var(--muted);
      text-align: center;
      margin: 0;
    }

    button, input {
      border-radius: 999px;
      border: none;
      padding: 12px 18px;
      font-size: 1rem;
    }

    button {
      background: var(--accent);
      color: white;
      font-weight: 600;
      cursor: pointer;
    }

    button.secondary {
      background: transparent;
      border: 1px solid var(--muted);
      color: var(--ink);
    }

    .error {
      color: var(--full);
      min-height: 1.2em;
    }

    table {
      width: 100%;
      border-collapse: collapse;
    }

    td, th {
      padding: 8px;
      border-bottom: 1px solid rgba(232, 230, 227, 0.08);
      text-align: left;
    }
  </style>
</head>
<body>
{{BODY}}
</body>
</html>
"#;

const PUBLIC_BODY: &str = r#"  <main class="app">
    <h1>Parking Control</h1>
    <section class="grid">
      <div class="card {{FULL_CLASS}}" id="available-card">
        <span class="label">Vagas Disponíveis</span>
        <span class="big" id="available">{{AVAILABLE}}</span>
        <span class="banner">LOTADO</span>
        <div class="bar"><span id="available-bar" style="width: {{PCT_AVAILABLE}}%"></span></div>
        <span class="hint"><span id="available-ratio">{{AVAILABLE}}</span> / <span class="total">{{TOTAL}}</span></span>
      </div>
      <div class="card">
        <span class="label">Vagas Ocupadas</span>
        <span class="big occupied" id="occupied">{{OCCUPIED}}</span>
        <div class="bar"><span class="occupied" id="occupied-bar" style="width: {{PCT_FULL}}%"></span></div>
        <span class="hint"><span id="occupied-ratio">{{OCCUPIED}}</span> / <span class="total">{{TOTAL}}</span></span>
      </div>
    </section>
    <p class="footer">Sistema de Monitoramento FabLab · {{SYSTEM}} · <a href="/admin">admin</a></p>
  </main>
  <script>
    const render = (view) => {
      document.getElementById('available').textContent = view.available;
      document.getElementById('available-ratio').textContent = view.available;
      document.getElementById('occupied').textContent = view.occupied;
      document.getElementById('occupied-ratio').textContent = view.occupied;
      document.getElementById('available-bar').style.width = `${view.percent_available}%`;
      document.getElementById('occupied-bar').style.width = `${view.percent_full}%`;
      document.querySelectorAll('.total').forEach((el) => { el.textContent = view.total; });
      document.getElementById('available-card').classList.toggle('full', view.is_full);
    };

    const refresh = async () => {
      const res = await fetch('/api/capacity');
      if (res.ok) {
        render(await res.json());
      }
    };

    setInterval(() => refresh().catch(() => {}), 5000);
  </script>"#;

const LOGIN_BODY: &str = r#"  <main class="app" style="max-width: 420px">
    <div class="card">
      <h2>Acesso Administrativo</h2>
      <p class="hint">Digite a senha para acessar o painel de administração</p>
      <form id="login-form">
        <input id="password" type="password" placeholder="Digite a senha" required />
        <button id="login-btn" type="submit">Entrar</button>
      </form>
      <p class="error" id="error"></p>
    </div>
  </main>
  <script>
    const form = document.getElementById('login-form');
    const errorEl = document.getElementById('error');
    const button = document.getElementById('login-btn');

    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      errorEl.textContent = '';
      button.disabled = true;
      button.textContent = 'Verificando...';
      const res = await fetch('/api/admin/login', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ password: document.getElementById('password').value })
      });
      if (res.ok) {
        window.location.reload();
        return;
      }
      errorEl.textContent = await res.text();
      button.disabled = false;
      button.textContent = 'Entrar';
    });
  </script>"#;

const ADMIN_BODY: &str = r#"  <main class="app">
    <h1>Painel Administrativo</h1>
    <section class="grid">
      <div class="card">
        <span class="label">Faturamento de ontem</span>
        <span class="value" id="yesterday">R$ 0.00</span>
      </div>
      <div class="card">
        <span class="label">Receita de hoje</span>
        <span class="value" id="today">R$ 0.00</span>
        <span class="hint" id="today-detail">0 entradas hoje</span>
      </div>
      <div class="card">
        <span class="label">Receita total</span>
        <span class="value" id="total">R$ 0.00</span>
        <span class="hint" id="total-detail">0 entradas</span>
      </div>
      <div class="card">
        <span class="label">Vagas</span>
        <span class="value" id="capacity">0 / 0</span>
        <span class="hint">disponíveis / total</span>
      </div>
    </section>

    <section class="grid">
      <div class="card">
        <button id="register-btn" type="button">Registrar entrada (R$ {{PRICE}})</button>
        <button id="export-btn" class="secondary" type="button">Exportar Relatório do Dia</button>
        <button id="logout-btn" class="secondary" type="button">Sair</button>
        <p class="error" id="status"></p>
      </div>
      <div class="card">
        <span class="label">Entradas recentes</span>
        <table><tbody id="recent"></tbody></table>
      </div>
    </section>

    <section class="card">
      <span class="label">Histórico de Relatórios</span>
      <table>
        <thead><tr><th>Data</th><th>Entradas</th><th>Receita</th><th></th></tr></thead>
        <tbody id="reports"></tbody>
      </table>
    </section>
  </main>
  <script>
    const money = (value) => `R$ ${Number(value).toFixed(2)}`;
    const statusEl = document.getElementById('status');

    const failOn = async (res) => {
      if (!res.ok) {
        throw new Error(await res.text());
      }
      return res;
    };

    const loadSummary = async () => {
      const data = await (await failOn(await fetch('/api/admin/summary'))).json();
      document.getElementById('yesterday').textContent = money(data.yesterday.revenue);
      document.getElementById('today').textContent = money(data.today.revenue);
      document.getElementById('today-detail').textContent = data.today.source === 'occupancy'
        ? `${data.today.count} vagas ocupadas (registre as entradas)`
        : `${data.today.count} entradas hoje`;
      document.getElementById('total').textContent = money(data.total_revenue);
      document.getElementById('total-detail').textContent = `${data.total_entries} entradas`;
      document.getElementById('capacity').textContent = `${data.capacity.available} / ${data.capacity.total}`;
      document.getElementById('recent').innerHTML = data.recent_entries
        .map((entry) => `<tr><td>${new Date(entry.created_at).toLocaleString('pt-BR')}</td><td>${money(entry.valor ?? data.price_per_entry)}</td></tr>`)
        .join('');
    };

    const loadReports = async () => {
      const reports = await (await failOn(await fetch('/api/admin/reports'))).json();
      document.getElementById('reports').innerHTML = reports
        .map((report) => `<tr><td>${report.date}</td><td>${report.total_entries}</td><td>${money(report.total_revenue)}</td><td><a href="/api/admin/reports/${report.date}/csv">CSV</a></td></tr>`)
        .join('');
    };

    const refresh = () => Promise.all([loadSummary(), loadReports()])
      .catch((err) => { statusEl.textContent = err.message; });

    document.getElementById('register-btn').addEventListener('click', async () => {
      try {
        await failOn(await fetch('/api/admin/entries', { method: 'POST' }));
        statusEl.textContent = 'Carro adicionado!';
        await refresh();
      } catch (err) {
        alert(err.message);
      }
    });

    document.getElementById('export-btn').addEventListener('click', async () => {
      try {
        const summary = await (await failOn(await fetch('/api/admin/export/today', { method: 'POST' }))).json();
        window.location.href = '/api/admin/export/today/txt';
        setTimeout(() => { window.location.href = '/api/admin/export/today/json'; }, 200);
        statusEl.textContent = `${summary.total_carros} carros · ${money(summary.valor_faturado)} · ${summary.arquivos}`;
      } catch (err) {
        alert(err.message);
      }
    });

    document.getElementById('logout-btn').addEventListener('click', async () => {
      await fetch('/api/admin/logout', { method: 'POST' });
      window.location.reload();
    });

    refresh();
    setInterval(refresh, 5000);
  </script>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Occupancy;

    #[test]
    fn public_page_shows_counts() {
        let html = render_public(&CapacityView::from(Occupancy::new(0, 4)));
        assert!(html.contains(r#"<span class="big" id="available">0</span>"#));
        assert!(html.contains(r#"id="occupied">4</span>"#));
        assert!(html.contains(r#"class="card full""#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn admin_page_shows_price() {
        let html = render_admin(Decimal::from(45));
        assert!(html.contains("R$ 45.00"));
        assert!(!html.contains("{{"));
    }
}
